// Static flow action completion
//
// Actions are written `keyword=value[,keyword=value...]`. The partial
// string is split into finished and unfinished assignments, and the last
// one decides whether keywords, values or terminators are offered.

use super::Completions;

const ACTIONS: [(&str, &str); 12] = [
    ("output=", "Describe packet forwarding"),
    ("enqueue=", "Enqueue packet"),
    ("strip-vlan=", "Strip Vlan"),
    ("set-vlan-id=", "Set Vlan"),
    ("set-vlan-priority=", "Set Priority"),
    ("set-src-mac=", "Set Src Mac"),
    ("set-dst-mac=", "Set Dst Mac"),
    ("set-tos-bits=", "Set TOS Bits"),
    ("set-src-ip=", "Set IP Src"),
    ("set-dst-ip=", "Set IP Dst"),
    ("set-src-port=", "Set Src IP Port"),
    ("set-dst-port=", "Set dst IP Port"),
];

/// What may follow `keyword=`.
#[derive(Debug, Clone, Copy)]
enum ActionValue {
    /// A literal value.
    Word(&'static str),
    /// A value domain, shown as help.
    Placeholder(&'static str),
}

const ACTION_VALUES: [(&str, ActionValue, &str); 15] = [
    ("output", ActionValue::Word("all"), "Forward to all ports"),
    ("output", ActionValue::Word("controller"), "Forward to controller"),
    ("output", ActionValue::Word("local"), "Forward to local"),
    ("output", ActionValue::Word("ingress-port"), "Forward to ingress port"),
    ("output", ActionValue::Word("normal"), "Forward to ingress port"),
    ("output", ActionValue::Word("flood"), "Forward, flood ports"),
    ("output", ActionValue::Placeholder("<number>"), "Forward, to a specific port"),
    (
        "enqueue",
        ActionValue::Placeholder("<portNumber>.<queueID>"),
        "Enqueue to port, queue id",
    ),
    ("set-vlan-id", ActionValue::Placeholder("<vlan number>"), "Set vlan to <vlan number>"),
    ("set-vlan-priority", ActionValue::Placeholder("<vlan prio>"), "Set vlan priority to <prio>"),
    ("set-tos-bits", ActionValue::Placeholder("<number>"), "Set TOS bits"),
    ("set-src-mac", ActionValue::Placeholder("<src-mac-address>"), "Set src mac address"),
    ("set-dst-mac", ActionValue::Placeholder("<dst-mac-address>"), "Set dst mac address"),
    ("set-src-ip", ActionValue::Placeholder("<src-ip-address>"), "Set src ip address"),
    ("set-dst-ip", ActionValue::Placeholder("<dst-ip-address>"), "Set dst ip address"),
];

/// One parsed `keyword=value` segment.
#[derive(Debug, PartialEq, Eq)]
enum Assignment<'a> {
    /// `keyword=` with nothing after the equals sign.
    Open(&'a str),
    Complete(&'a str, &'a str),
}

/// Complete a comma separated static flow action list.
pub fn complete_staticflow_actions(prefix: &str, completions: &mut Completions) {
    let mut assignments = Vec::new();
    for segment in prefix.split(',') {
        let parts: Vec<&str> = segment.split('=').collect();
        match *parts.as_slice() {
            [keyword] if !keyword.is_empty() => {
                for (action, reason) in ACTIONS.iter().filter(|(a, _)| a.starts_with(keyword)) {
                    completions.insert(*action, *reason);
                }
                return;
            }
            [keyword, value] if !keyword.is_empty() && !value.is_empty() => {
                assignments.push(Assignment::Complete(keyword, value));
            }
            [keyword, ""] if !keyword.is_empty() => assignments.push(Assignment::Open(keyword)),
            _ => {}
        }
    }

    // Everything up to and including the last comma.
    let base = prefix.rfind(',').map_or("", |i| &prefix[..=i]);

    if prefix.is_empty() || prefix.ends_with(',') {
        for (action, reason) in ACTIONS {
            completions.insert(format!("{base}{action}"), reason);
        }
        return;
    }

    let Some(last) = assignments.last() else {
        return;
    };
    match *last {
        Assignment::Open(keyword) if prefix.ends_with('=') => {
            for (_, value, reason) in ACTION_VALUES.iter().filter(|(k, _, _)| *k == keyword) {
                let (ActionValue::Word(text) | ActionValue::Placeholder(text)) = *value;
                completions.insert(format!("{base}{keyword}={text}"), *reason);
            }
        }
        Assignment::Complete(keyword, typed) => {
            for (_, value, _) in ACTION_VALUES.iter().filter(|(k, _, _)| *k == keyword) {
                let ActionValue::Word(word) = *value else {
                    continue;
                };
                if word == typed {
                    completions.insert(format!("{prefix} <cr>"), "Complete Choice");
                    completions.insert(format!("{prefix},"), "Add another action");
                } else if word.starts_with(typed) {
                    completions.insert(format!("{base}{keyword}={word}"), "Complete selection");
                }
            }
        }
        Assignment::Open(_) => {}
    }
}
