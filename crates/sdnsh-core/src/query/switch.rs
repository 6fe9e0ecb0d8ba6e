// Switch and port reshaping
//
// `switches` returns one entry per connected switch with its port list.
// Mastership comes from a separate endpoint and is joined in by dpid.

use std::collections::HashMap;

use sdnsh_api::{Query, Row};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{FieldFilter, decode_entries, row};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SwitchEntry {
    dpid: String,
    #[serde(default)]
    connected_since: Value,
    #[serde(default)]
    inet_address: Option<String>,
    #[serde(default)]
    actions: Value,
    #[serde(default)]
    capabilities: Value,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    ports: Vec<SwitchPort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchPort {
    port_number: Value,
    name: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    state: Value,
    #[serde(default)]
    advertised_features: Value,
    #[serde(default)]
    current_features: Value,
    #[serde(default)]
    hardware_address: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Master {
    controller_id: Option<String>,
}

/// dpid to master controller id.
#[derive(Debug, Default)]
pub(crate) struct Mastership(HashMap<String, String>);

impl Mastership {
    pub(crate) fn from_reply(reply: Value) -> Self {
        let parsed: HashMap<String, Vec<Master>> = serde_json::from_value(reply).unwrap_or_default();
        Self(
            parsed
                .into_iter()
                .filter_map(|(dpid, masters)| {
                    let id = masters.into_iter().next()?.controller_id?;
                    Some((dpid, id))
                })
                .collect(),
        )
    }

    fn controller(&self, dpid: &str) -> Value {
        self.0
            .get(dpid)
            .map_or(Value::Null, |id| Value::String(id.clone()))
    }
}

/// `/192.168.2.104:38420` into address and port.
fn split_inet_address(inet: Option<&str>) -> (String, String) {
    let Some(inet) = inet.filter(|s| !s.is_empty()) else {
        return (String::new(), String::new());
    };
    let inet = inet.strip_prefix('/').unwrap_or(inet);
    match inet.rsplit_once(':') {
        Some((ip, port)) => (ip.to_owned(), port.to_owned()),
        None => (inet.to_owned(), String::new()),
    }
}

// ── switches ─────────────────────────────────────────────────────────

pub(crate) fn switch_rows(entries: Vec<Value>, query: &Query, mastership: &Mastership) -> Vec<Row> {
    let dpid_filter = FieldFilter::from_query(query, "dpid");
    let attr = |entry: &SwitchEntry, name: &str| {
        entry
            .attributes
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    };

    decode_entries::<SwitchEntry>("switches", entries)
        .into_iter()
        .filter(|entry| dpid_filter.matches(&entry.dpid))
        .map(|entry| {
            let (ip_address, tcp_port) = split_inet_address(entry.inet_address.as_deref());
            row([
                ("dpid", entry.dpid.as_str().into()),
                ("connected-since", entry.connected_since.clone()),
                ("ip-address", ip_address.into()),
                ("tcp-port", tcp_port.into()),
                ("actions", entry.actions.clone()),
                ("capabilities", entry.capabilities.clone()),
                ("dp-desc", attr(&entry, "DescriptionData")),
                ("fast-wildcards", attr(&entry, "FastWildcards")),
                ("supports-nx-role", attr(&entry, "supportsNxRole")),
                ("supports-ofpp-flood", attr(&entry, "supportsOfppFlood")),
                ("supports-ofpp-table", attr(&entry, "supportsOfppTable")),
                ("core-switch", Value::Bool(false)),
                ("controller", mastership.controller(&entry.dpid)),
            ])
        })
        .collect()
}

// ── interfaces ───────────────────────────────────────────────────────

/// One row per switch port, keyed `dpid|portName`. The endpoint cannot
/// search port names, so name filters apply here, without case.
pub(crate) fn interface_rows(entries: Vec<Value>, query: &Query) -> Vec<Row> {
    let dpid_field = if query.terms().iter().any(|t| t.field == "switch") {
        "switch"
    } else {
        "dpid"
    };
    let dpid_filter = FieldFilter::from_query(query, dpid_field);
    let name_filter = FieldFilter::from_query(query, "portName").lowercase();

    let mut result = Vec::new();
    for entry in decode_entries::<SwitchEntry>("interfaces", entries) {
        if !dpid_filter.matches(&entry.dpid) {
            continue;
        }
        for port in &entry.ports {
            if !name_filter.matches(&port.name) {
                continue;
            }
            result.push(row([
                ("id", format!("{}|{}", entry.dpid, port.name).into()),
                ("portNumber", port.port_number.clone()),
                ("switch", entry.dpid.as_str().into()),
                ("portName", port.name.as_str().into()),
                ("config", port.config.clone()),
                ("state", port.state.clone()),
                ("advertisedFeatures", port.advertised_features.clone()),
                ("currentFeatures", port.current_features.clone()),
                ("hardwareAddress", port.hardware_address.clone()),
            ]));
        }
    }
    result
}

// ── Port name checks ─────────────────────────────────────────────────

/// Warnings for port names that repeat on one switch, exactly or when
/// compared without case.
pub(crate) fn switch_port_warnings(entries: &[SwitchEntry]) -> Vec<String> {
    let mut warnings = Vec::new();
    for entry in entries {
        let names: Vec<&str> = entry.ports.iter().map(|p| p.name.as_str()).collect();
        for (i, name) in names.iter().enumerate() {
            for other in &names[i + 1..] {
                if name == other {
                    warnings.push(format!(
                        "switch {} duplicate interface names: {name}",
                        entry.dpid
                    ));
                } else if name.eq_ignore_ascii_case(other) {
                    let mut colliding: Vec<&str> = names
                        .iter()
                        .copied()
                        .filter(|n| n.eq_ignore_ascii_case(name))
                        .collect();
                    colliding.dedup();
                    warnings.push(format!(
                        "switch {} case insensitive interface names: {}",
                        entry.dpid,
                        colliding.join(" - ")
                    ));
                }
            }
        }
    }
    warnings
}
