// Feature and controller-node sections

use sdnsh_api::Row;
use serde_json::Value;

use super::indent;
use crate::error::CoreError;
use crate::key::{CompoundKey, SEPARATOR};
use crate::session::Session;
use crate::util::{field_text, value_text, values_equal};

/// Ports the first interface of every controller opens by default.
const DEFAULT_OPEN_PORTS: &[i64] = &[22, 6633];

/// Well-known tcp ports and the firewall keyword naming each.
const TCP_PORT_NAMES: &[(i64, &str)] = &[(6633, "openflow"), (80, "web"), (443, "ssl"), (22, "ssh")];

/// The command text enabling one firewall rule.
pub(crate) fn firewall_rule(rule: &Row) -> String {
    let src = match field_text(rule, "src-ip") {
        ip if ip.is_empty() => String::new(),
        ip => format!("from {ip} "),
    };
    let dst = match field_text(rule, "vrrp-ip") {
        ip if ip.is_empty() => String::new(),
        ip => format!("local-ip {ip} "),
    };
    let proto = field_text(rule, "proto");
    let port = rule.get("port").and_then(int_value);
    let well_known = TCP_PORT_NAMES
        .iter()
        .find(|(p, _)| proto == "tcp" && Some(*p) == port)
        .map(|(_, name)| *name);
    match (proto.as_str(), well_known) {
        (_, Some(name)) => format!("firewall allow {src}{dst}{name}"),
        ("vrrp", None) => format!("firewall allow {src}{dst}vrrp"),
        _ => format!("firewall allow {src}{dst}{proto} {}", field_text(rule, "port")),
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_default_tcp_rule(rule: &Row) -> bool {
    field_text(rule, "proto") == "tcp"
        && rule
            .get("port")
            .and_then(int_value)
            .is_some_and(|p| DEFAULT_OPEN_PORTS.contains(&p))
}

impl Session {
    pub(super) async fn running_config_feature(&self, config: &mut String) -> Result<(), CoreError> {
        let Some(rows) = self.section_table("feature").await else {
            return Ok(());
        };
        let Some(feature) = rows.first() else {
            return Ok(());
        };
        let mi = self.registry();
        let mut lines = String::new();
        for field in mi.obj_type_fields("feature") {
            if mi.is_primary_key("feature", field) || mi.is_foreign_key("feature", field) {
                continue;
            }
            let Some(value) = feature.get(field) else {
                continue;
            };
            if !mi.not_default_value("feature", field, value) {
                continue;
            }
            let name = field.trim_end_matches("-feature");
            if mi.field_default_value("feature", field) == Some(&Value::Bool(true)) {
                lines.push_str(&format!("no feature {name}\n"));
            } else {
                lines.push_str(&format!("feature {name}\n"));
            }
        }
        if !lines.is_empty() {
            config.push_str("! features enabled/disabled\n");
            config.push_str(&lines);
        }
        Ok(())
    }

    pub(super) async fn running_config_controller_node(
        &self,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(nodes) = self.section_table("controller-node").await else {
            return Ok(());
        };
        let interfaces = self.section_table("controller-interface").await.unwrap_or_default();
        let name_servers = self
            .section_table("controller-domain-name-server")
            .await
            .unwrap_or_default();
        let firewall_rules = self.section_table("firewall-rule").await.unwrap_or_default();
        let aliases = self
            .create_obj_type_dict("controller-alias", "controller", None)
            .await;

        let key = self.registry().pk("controller-node").unwrap_or("id");
        if let Some(id) = id {
            if !nodes.iter().any(|n| field_text(n, key) == id) {
                return Err(CoreError::NotFound {
                    kind: "controller".into(),
                    id: id.into(),
                });
            }
        }

        for node in &nodes {
            let node_id = field_text(node, key);
            if id.is_some_and(|id| id != node_id) {
                continue;
            }
            let mut body = String::new();
            if let Some(alias) = aliases.get(&node_id).and_then(|rows| rows.first()) {
                body.push_str(&format!("  controller-alias {}\n", field_text(alias, "alias")));
            }
            self.controller_settings(&mut body, node, &name_servers, &node_id);
            for interface in interfaces.iter().filter(|i| owner(i, "id") == node_id) {
                self.controller_interface(&mut body, interface, &firewall_rules);
            }
            if !body.is_empty() || node_id != "localhost" {
                config.push_str(&format!("!\ncontroller-node {node_id}\n"));
                config.push_str(&body);
            }
        }
        Ok(())
    }

    /// A controller-node setting that differs from its default; absent and
    /// null values never do.
    fn changed(&self, node: &Row, field: &str) -> Option<String> {
        let value = node.get(field).filter(|v| !v.is_null())?;
        let same = self
            .registry()
            .field_default_value("controller-node", field)
            .is_some_and(|default| values_equal(value, default));
        (!same).then(|| value_text(value))
    }

    fn controller_settings(&self, body: &mut String, node: &Row, name_servers: &[Row], node_id: &str) {
        if let Some(ntp) = self.changed(node, "ntp-server") {
            body.push_str(&format!("  ntp server {ntp}\n"));
        }
        if let Some(zone) = self.changed(node, "time-zone") {
            body.push_str(&format!("  clock timezone {zone}\n"));
        }
        if let Some(lookups) = self.changed(node, "domain-lookups-enabled") {
            if lookups == "True" {
                body.push_str("  ip domain lookup\n");
            } else {
                body.push_str("  no ip domain lookup\n");
            }
        }
        if let Some(domain) = self.changed(node, "domain-name") {
            body.push_str(&format!("  ip domain name {domain}\n"));
        }

        let mut servers: Vec<&Row> = name_servers
            .iter()
            .filter(|dns| owner(dns, "id") == node_id)
            .collect();
        servers.sort_by_key(|dns| dns.get("timestamp").and_then(int_value).unwrap_or_default());
        for dns in servers {
            body.push_str(&format!("  ip name-server {}\n", field_text(dns, "ip")));
        }

        if let Some(gateway) = self.changed(node, "default-gateway") {
            body.push_str(&format!("  ip default-gateway {gateway}\n"));
        }
        if self.changed(node, "logging-enabled").as_deref() == Some("True") {
            body.push_str("  logging on\n");
        }
        let server = self.changed(node, "logging-server");
        let level = self.changed(node, "logging-level");
        if server.is_some() || level.is_some() {
            body.push_str(&format!("  logging server {}", field_text(node, "logging-server")));
            if let Some(level) = level {
                body.push_str(&format!(" level {level}"));
            }
            body.push('\n');
        }
    }

    fn controller_interface(&self, body: &mut String, interface: &Row, firewall_rules: &[Row]) {
        let if_id = field_text(interface, "id");
        let parts = CompoundKey::parse(&if_id, SEPARATOR);
        let (Some(if_type), Some(number)) = (parts.get(1), parts.get(2)) else {
            return;
        };
        let first = number == "0";
        let mut sub = String::new();

        let mut static_mode = true;
        let mode = field_text(interface, "mode");
        let mode_value = Value::String(mode.clone());
        if !mode.is_empty() && self.registry().not_default_value("controller-interface", "mode", &mode_value) {
            sub.push_str(&format!("{}ip mode {mode}\n", indent(2)));
            static_mode = mode == "static";
        }
        let ip = field_text(interface, "ip");
        let netmask = field_text(interface, "netmask");
        if static_mode && !ip.is_empty() && !netmask.is_empty() {
            sub.push_str(&format!("{}ip address {ip} {netmask}\n", indent(2)));
        }

        let rules: Vec<&Row> = firewall_rules
            .iter()
            .filter(|r| field_text(r, "interface") == if_id)
            .collect();
        if first {
            for port in DEFAULT_OPEN_PORTS {
                let open = rules
                    .iter()
                    .any(|r| is_default_tcp_rule(r) && r.get("port").and_then(int_value) == Some(*port));
                if !open {
                    sub.push_str(&format!("{}no firewall {port} tcp\n", indent(2)));
                }
            }
        }
        for rule in rules {
            if first && is_default_tcp_rule(rule) {
                continue;
            }
            sub.push_str(&format!("{}{}\n", indent(2), firewall_rule(rule)));
        }

        if !sub.is_empty() || !(if_type == "Ethernet" && first) {
            body.push_str(&format!("  interface {if_type} {number}\n"));
            body.push_str(&sub);
        }
    }
}

/// First component of a compound key field.
fn owner(row: &Row, field: &str) -> String {
    CompoundKey::parse(&field_text(row, field), SEPARATOR)
        .get(0)
        .unwrap_or_default()
        .to_owned()
}
