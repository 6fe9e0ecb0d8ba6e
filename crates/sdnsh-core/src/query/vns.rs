// VNS interface reshaping

use sdnsh_api::Row;
use serde::Deserialize;
use serde_json::Value;

use super::{decode_entries, row};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VnsInterface {
    name: String,
    #[serde(rename = "parentVNS")]
    parent_vns: ParentVns,
    #[serde(default)]
    parent_rule: Option<ParentRule>,
    #[serde(default)]
    last_seen: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentVns {
    name: String,
    #[serde(default)]
    address_space_name: Value,
}

#[derive(Debug, Deserialize)]
struct ParentRule {
    #[serde(default)]
    name: Option<String>,
}

/// One row per live vns interface, keyed `vns|interface`. Interfaces
/// created without a matching rule belong to the `default` rule.
pub(crate) fn vns_interface_rows(entries: Vec<Value>) -> Vec<Row> {
    decode_entries::<VnsInterface>("vns-interface", entries)
        .into_iter()
        .map(|entry| {
            let vns = entry.parent_vns.name;
            let rule = entry
                .parent_rule
                .and_then(|r| r.name)
                .unwrap_or_else(|| "default".to_owned());
            row([
                ("id", format!("{vns}|{}", entry.name).into()),
                ("vns", vns.into()),
                ("address-space", entry.parent_vns.address_space_name),
                ("interface", entry.name.into()),
                ("rule", rule.into()),
                ("last-seen", entry.last_seen),
            ])
        })
        .collect()
}
