// Tenant and virtual network sections

use indexmap::IndexMap;
use sdnsh_api::Row;
use serde_json::Value;

use super::indent;
use crate::error::CoreError;
use crate::key::{CompoundKey, SEPARATOR};
use crate::session::Session;
use crate::util::{field_text, ip_and_neg_mask};

/// vns-definition fields emitted as plain `<field> <value>` lines.
const VNS_FIELDS: &[&str] = &[
    "arp-mode",
    "broadcast",
    "description",
    "dhcp-ip",
    "dhcp-mode",
    "origin",
    "priority",
];

/// vns-interface-rule fields emitted as `match <field> <value>`.
const RULE_MATCH_FIELDS: &[&str] = &["mac", "ip-subnet", "vlans", "tags"];

const DEFAULT_TENANT: &str = "default";

// ── Access-list text ─────────────────────────────────────────────────

fn port_op(op: &str, port: &str) -> String {
    match op {
        "eq" | "neq" => format!("{op} {port} "),
        _ => String::new(),
    }
}

fn present(acl: &Row, field: &str) -> Option<String> {
    Some(field_text(acl, field)).filter(|v| !v.is_empty())
}

/// The match part of an access-list entry, as typed after
/// `<rule> <action> <type>`.
pub(crate) fn acl_entry_text(acl: &Row) -> String {
    let kind = field_text(acl, "type");
    let src = present(acl, "src-ip").zip(present(acl, "src-ip-mask"));
    let dst = present(acl, "dst-ip").zip(present(acl, "dst-ip-mask"));
    let is_protocol_number = !kind.is_empty() && kind.chars().all(|c| c.is_ascii_digit());

    match kind.as_str() {
        "tcp" | "udp" | "ip" | "icmp" => {}
        "mac" => return mac_entry_text(acl),
        _ if is_protocol_number => {}
        _ => return "[unrecognized acl format]".into(),
    }
    let Some((src_ip, src_mask)) = src else {
        return "[broken src ip or mask]".into();
    };
    let Some((dst_ip, dst_mask)) = dst else {
        return "[broken dst ip or mask]".into();
    };
    let src = ip_and_neg_mask(&src_ip, &src_mask);
    let dst = ip_and_neg_mask(&dst_ip, &dst_mask);
    match kind.as_str() {
        "tcp" | "udp" => format!(
            "{src}{}{dst}{}",
            port_op(&field_text(acl, "src-tp-port-op"), &field_text(acl, "src-tp-port")),
            port_op(&field_text(acl, "dst-tp-port-op"), &field_text(acl, "dst-tp-port")),
        ),
        "icmp" => format!("{src}{dst}{}", field_text(acl, "icmp-type")),
        _ => format!("{src}{dst}"),
    }
}

fn mac_entry_text(acl: &Row) -> String {
    let src = present(acl, "src-mac").unwrap_or_else(|| "any".into());
    let dst = present(acl, "dst-mac").unwrap_or_else(|| "any".into());
    match (present(acl, "ether-type"), present(acl, "vlan")) {
        (Some(ether), Some(vlan)) => format!("{src} {dst} {ether} vlan {vlan}"),
        (None, Some(vlan)) => format!("{src} {dst} vlan {vlan}"),
        (ether, None) => format!("{src} {dst} {}", ether.unwrap_or_default()),
    }
}

fn rule_number(acl: &Row) -> i64 {
    match acl.get("rule") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

/// Last component of a compound key.
fn last_part(key: &str) -> String {
    let parts = CompoundKey::parse(key, SEPARATOR);
    parts.get(parts.len().saturating_sub(1)).unwrap_or_default().to_owned()
}

// ── Section tables ───────────────────────────────────────────────────

/// Every table the tenant and vns sections read, grouped by owner.
#[derive(Debug, Default)]
struct VnsTables {
    definitions: Vec<Row>,
    rules: IndexMap<String, Vec<Row>>,
    acls: IndexMap<String, Vec<Row>>,
    acl_entries: IndexMap<String, Vec<Row>>,
    interfaces: IndexMap<String, Vec<Row>>,
    interface_acls: IndexMap<String, Vec<Row>>,
}

impl Session {
    async fn vns_tables(&self) -> Option<VnsTables> {
        Some(VnsTables {
            definitions: self.section_table("vns-definition").await?,
            rules: self.create_obj_type_dict("vns-interface-rule", "vns", None).await,
            acls: self.create_obj_type_dict("vns-access-list", "vns", None).await,
            acl_entries: self
                .create_obj_type_dict("vns-access-list-entry", "vns-access-list", None)
                .await,
            interfaces: self.create_obj_type_dict("vns-interface-config", "vns", None).await,
            interface_acls: self
                .create_obj_type_dict("vns-interface-access-list", "vns-interface", None)
                .await,
        })
    }

    pub(super) async fn running_config_tenant(
        &self,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(tenants) = self.section_table("tenant").await else {
            return Ok(());
        };
        if let Some(id) = id {
            if !tenants.iter().any(|t| field_text(t, "name") == id) {
                return Err(CoreError::NotFound {
                    kind: "tenant".into(),
                    id: id.into(),
                });
            }
        }
        let tables = self.vns_tables().await.unwrap_or_default();
        for tenant in &tenants {
            let name = field_text(tenant, "name");
            if id.is_some_and(|id| id != name) {
                continue;
            }
            config.push_str(&format!("!\ntenant {name}\n"));
            self.tenant_details(config, tenant);
            for vns in tables.definitions.iter().filter(|v| field_text(v, "tenant") == name) {
                self.vns_definition_block(config, vns, &tables, 1).await;
                self.vns_block(config, vns, &tables, 1);
            }
        }
        Ok(())
    }

    /// Virtual networks of the default tenant, or the one named by `id`.
    pub(super) async fn running_config_vns(
        &self,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(tables) = self.vns_tables().await else {
            return Ok(());
        };
        let selected: Vec<&Row> = match id {
            Some(id) => {
                let found: Vec<&Row> = tables
                    .definitions
                    .iter()
                    .filter(|v| field_text(v, "id") == id || field_text(v, "vnsname") == id)
                    .collect();
                if found.is_empty() {
                    return Err(CoreError::NotFound {
                        kind: "vns".into(),
                        id: id.into(),
                    });
                }
                found
            }
            None => tables
                .definitions
                .iter()
                .filter(|v| field_text(v, "tenant") == DEFAULT_TENANT)
                .collect(),
        };
        for vns in &selected {
            self.vns_definition_block(config, vns, &tables, 0).await;
        }
        for vns in &selected {
            self.vns_block(config, vns, &tables, 0);
        }
        Ok(())
    }

    fn tenant_details(&self, config: &mut String, tenant: &Row) {
        if tenant.get("active") == Some(&Value::Bool(false)) {
            config.push_str(&format!("{}no active\n", indent(1)));
        }
        for field in ["description", "origin"] {
            if let Some(value) = tenant.get(field) {
                self.include_field(config, "tenant", field, value, 1, "");
            }
        }
    }

    /// `vns-definition <name>` with its settings and interface rules.
    async fn vns_definition_block(&self, config: &mut String, vns: &Row, tables: &VnsTables, level: usize) {
        let head = if level == 0 { "!\n" } else { "" };
        config.push_str(&format!(
            "{head}{}vns-definition {}\n",
            indent(level),
            field_text(vns, "vnsname")
        ));
        let level = level + 1;
        if vns.get("active") == Some(&Value::Bool(false)) {
            config.push_str(&format!("{}no active\n", indent(level)));
        }
        for field in VNS_FIELDS {
            if let Some(value) = vns.get(*field) {
                self.include_field(config, "vns-definition", field, value, level, "");
            }
        }
        if let Some(value) = vns.get("address-space") {
            self.include_field(config, "vns-definition", "address-space", value, level, "use ");
        }
        let vns_id = field_text(vns, "id");
        for rule in tables.rules.get(&vns_id).into_iter().flatten() {
            self.interface_rule(config, rule, level).await;
        }
    }

    async fn interface_rule(&self, config: &mut String, rule: &Row, level: usize) {
        config.push_str(&format!("{}interface-rule {}\n", indent(level), field_text(rule, "rule")));
        let level = level + 1;
        for field in ["description", "active", "priority"] {
            if let Some(value) = rule.get(field) {
                self.include_field(config, "vns-interface-rule", field, value, level, "");
            }
        }
        for field in RULE_MATCH_FIELDS {
            if let Some(value) = rule.get(*field) {
                self.include_field(config, "vns-interface-rule", field, value, level, "match ");
            }
        }
        for flag in ["allow-multiple", "vlan-tag-on-egress"] {
            if rule.get(flag) == Some(&Value::Bool(true)) {
                config.push_str(&format!("{}{flag}\n", indent(level)));
            }
        }
        let switch = field_text(rule, "switch");
        if !switch.is_empty() {
            let name = self
                .alias_lookup_with_foreign_key("switch-alias", &switch)
                .await
                .unwrap_or(switch);
            match present(rule, "ports") {
                Some(ports) => config.push_str(&format!("{}match switch {name} {ports}\n", indent(level))),
                None => config.push_str(&format!("{}match switch {name}\n", indent(level))),
            }
        }
    }

    /// `vns <name>` with its access lists and interface access groups;
    /// left out when it has neither.
    fn vns_block(&self, config: &mut String, vns: &Row, tables: &VnsTables, level: usize) {
        let vns_id = field_text(vns, "id");
        let body_level = level + 1;
        let mut body = String::new();

        for acl in tables.acls.get(&vns_id).into_iter().flatten() {
            body.push_str(&format!("{}access-list {}\n", indent(body_level), field_text(acl, "name")));
            for field in ["priority", "description"] {
                if let Some(value) = acl.get(field) {
                    self.include_field(&mut body, "vns-access-list", field, value, body_level + 1, "");
                }
            }
            let mut entries: Vec<&Row> = tables
                .acl_entries
                .get(&field_text(acl, "id"))
                .into_iter()
                .flatten()
                .collect();
            entries.sort_by_key(|e| rule_number(e));
            for entry in entries {
                body.push_str(&format!(
                    "{}{} {} {} {}\n",
                    indent(body_level + 1),
                    field_text(entry, "rule"),
                    field_text(entry, "action"),
                    field_text(entry, "type"),
                    acl_entry_text(entry)
                ));
            }
        }

        for interface in tables.interfaces.get(&vns_id).into_iter().flatten() {
            let groups: Vec<&Row> = tables
                .interface_acls
                .get(&field_text(interface, "id"))
                .into_iter()
                .flatten()
                .collect();
            if groups.is_empty() {
                continue;
            }
            body.push_str(&format!("{}interface {}\n", indent(body_level), field_text(interface, "interface")));
            for group in groups {
                body.push_str(&format!(
                    "{}access-group {} {}\n",
                    indent(body_level + 1),
                    last_part(&field_text(group, "vns-access-list")),
                    field_text(group, "in-out")
                ));
            }
        }

        if !body.is_empty() {
            let head = if level == 0 { "!\n" } else { "" };
            config.push_str(&format!("{head}{}vns {}\n", indent(level), field_text(vns, "vnsname")));
            config.push_str(&body);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::SessionConfig;
    use crate::model::Catalog;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn tcp_entries_include_port_operators() {
        let acl = row(json!({
            "type": "tcp",
            "src-ip": "10.0.0.0", "src-ip-mask": "0.0.0.255",
            "dst-ip": "0.0.0.0", "dst-ip-mask": "255.255.255.255",
            "dst-tp-port-op": "eq", "dst-tp-port": 80,
        }));
        assert_eq!(acl_entry_text(&acl), "10.0.0.0/24 any eq 80 ");
    }

    #[test]
    fn ip_and_protocol_number_entries() {
        let acl = row(json!({
            "type": "17",
            "src-ip": "10.0.0.1", "src-ip-mask": "0.0.0.0",
            "dst-ip": "0.0.0.0", "dst-ip-mask": "255.255.255.255",
        }));
        assert_eq!(acl_entry_text(&acl), "10.0.0.1/32 any ");
    }

    #[test]
    fn mac_entries_default_to_any() {
        assert_eq!(
            acl_entry_text(&row(json!({"type": "mac", "dst-mac": "00:00:00:00:00:01", "vlan": 5}))),
            "any 00:00:00:00:00:01 vlan 5"
        );
        assert_eq!(
            acl_entry_text(&row(json!({"type": "mac", "ether-type": 2048}))),
            "any any 2048"
        );
    }

    #[test]
    fn broken_entries_are_flagged() {
        assert_eq!(
            acl_entry_text(&row(json!({"type": "udp", "src-ip": "10.0.0.1"}))),
            "[broken src ip or mask]"
        );
        assert_eq!(
            acl_entry_text(&row(json!({"type": "arp"}))),
            "[unrecognized acl format]"
        );
    }

    #[test]
    fn key_tail() {
        assert_eq!(last_part("default|vns1|acl1"), "acl1");
        assert_eq!(last_part("acl1"), "acl1");
    }

    #[test]
    fn vns_block_lists_acls_and_groups() {
        let s = Session::new(SessionConfig::default(), Arc::new(Catalog::builtin().unwrap())).unwrap();
        let vns = row(json!({"id": "default|v1", "tenant": "default", "vnsname": "v1"}));
        let mut tables = VnsTables::default();
        tables.acls.insert(
            "default|v1".into(),
            vec![row(json!({"id": "default|v1|a1", "vns": "default|v1", "name": "a1", "priority": 32768}))],
        );
        tables.acl_entries.insert(
            "default|v1|a1".into(),
            vec![
                row(json!({"rule": "20", "action": "deny", "type": "mac"})),
                row(json!({"rule": "10", "action": "permit", "type": "mac", "src-mac": "00:00:00:00:00:01"})),
            ],
        );
        tables.interfaces.insert(
            "default|v1".into(),
            vec![
                row(json!({"id": "default|v1|h1", "interface": "h1"})),
                row(json!({"id": "default|v1|h2", "interface": "h2"})),
            ],
        );
        tables.interface_acls.insert(
            "default|v1|h1".into(),
            vec![row(json!({"vns-access-list": "default|v1|a1", "in-out": "in"}))],
        );

        let mut config = String::new();
        s.vns_block(&mut config, &vns, &tables, 0);
        assert_eq!(
            config,
            "!\nvns v1\n\
             \x20 access-list a1\n\
             \x20   10 permit mac 00:00:00:00:00:01 any \n\
             \x20   20 deny mac any any \n\
             \x20 interface h1\n\
             \x20   access-group a1 in\n"
        );
    }

    #[test]
    fn empty_vns_blocks_are_left_out() {
        let s = Session::new(SessionConfig::default(), Arc::new(Catalog::builtin().unwrap())).unwrap();
        let vns = row(json!({"id": "default|v2", "vnsname": "v2"}));
        let mut config = String::new();
        s.vns_block(&mut config, &vns, &VnsTables::default(), 0);
        assert_eq!(config, "");
    }
}
