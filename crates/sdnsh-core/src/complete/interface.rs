// Interface list completion
//
// Interface lists are comma separated names or `name-N` ranges, e.g.
// `Eth1,Eth3-5`. The last character of the partial list decides what
// comes next.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use sdnsh_api::{Lookup, Row};

use super::Completions;
use crate::error::CoreError;
use crate::session::Session;
use crate::util::{field_text, pattern};

static LAST_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(.*?)(\d+)$"));

const LIST: &str = "List of interfaces";
const RANGE: &str = "Range of interfaces";
const CURRENT: &str = "Current interfaces selection";

impl Session {
    /// Complete an interface list for the switch named in `data`.
    pub async fn complete_interface_list(
        &self,
        prefix: &str,
        data: &Row,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        let switch = field_text(data, "switch");
        if switch.is_empty() {
            return Ok(());
        }

        let mut interfaces: IndexSet<String> = self
            .get_model_from_url("interfaces", data)
            .await?
            .iter()
            .map(|port| field_text(port, "portName"))
            .collect();
        let configured = self
            .store()
            .get_table_from_store(
                "switch-interface-config",
                Some(("switch", switch.as_str())),
                Lookup::StartsWith,
            )
            .await?;
        interfaces.extend(configured.iter().map(|row| field_text(row, "name")));
        interfaces.retain(|name| !name.is_empty());

        interface_list_choices(&interfaces, prefix, completions);
        Ok(())
    }
}

fn starting_with(
    interfaces: &IndexSet<String>,
    partial: &str,
    front: &str,
    completions: &mut Completions,
) {
    for name in interfaces.iter().filter(|n| n.starts_with(partial)) {
        completions.insert(format!("{front}{name}"), "known interface");
    }
}

/// Range ends for `name`: the numbers above its trailing number among
/// interfaces sharing its stem.
fn higher_interfaces(
    interfaces: &IndexSet<String>,
    name: &str,
    prefix: &str,
    completions: &mut Completions,
) {
    let Some(caps) = LAST_DIGITS_RE.captures(name) else {
        return;
    };
    let stem = &caps[1];
    let Ok(first) = caps[2].parse::<u64>() else {
        return;
    };
    for other in interfaces {
        if let Some(c) = LAST_DIGITS_RE.captures(other) {
            if &c[1] == stem && c[2].parse::<u64>().is_ok_and(|n| n > first) {
                completions.insert(format!("{prefix}{}", &c[2]), "interface choice");
            }
        }
    }
}

pub(crate) fn interface_list_choices(
    interfaces: &IndexSet<String>,
    prefix: &str,
    completions: &mut Completions,
) {
    let Some(last) = prefix.chars().last() else {
        starting_with(interfaces, "", "", completions);
        return;
    };

    if last == '-' {
        let previous = &prefix[..prefix.len() - 1];
        if let Some(last_item) = previous.rsplit(',').next().filter(|s| !s.is_empty()) {
            if interfaces.contains(last_item) {
                higher_interfaces(interfaces, last_item, prefix, completions);
            }
        }
        return;
    }

    if last != ',' {
        if prefix.len() <= 2 {
            starting_with(interfaces, prefix, "", completions);
            return;
        }
        let (front, last_item) = match prefix.rsplit_once(',') {
            Some((front, last_item)) => (format!("{front},"), last_item),
            None => (String::new(), prefix),
        };
        if interfaces.contains(last_item) {
            completions.insert(format!("{prefix},"), LIST);
            completions.insert(format!("{prefix}-"), RANGE);
            completions.insert(format!("{prefix} <cr>"), CURRENT);
            return;
        }
        let is_range = interfaces.iter().any(|name| {
            last_item.len() > name.len()
                && last_item.starts_with(name.as_str())
                && last_item.as_bytes()[name.len()] == b'-'
        });
        if is_range {
            completions.insert(format!("{prefix},"), LIST);
            completions.insert(format!("{prefix} <cr>"), CURRENT);
            return;
        }
        starting_with(interfaces, last_item, &front, completions);
        return;
    }

    if prefix.len() == 1 {
        return;
    }
    starting_with(interfaces, "", prefix, completions);
}
