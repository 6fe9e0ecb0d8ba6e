// Switch section: switch settings, interfaces and static flow entries

use sdnsh_api::Row;
use serde_json::Value;

use super::indent;
use crate::error::CoreError;
use crate::session::Session;
use crate::util::{compare_compound_keys, field_text};

/// Flow-entry fields rendered by other means or never configurable.
const FLOW_SKIPPED_FIELDS: &[&str] = &["name", "switch"];

impl Session {
    pub(super) async fn running_config_switch(
        &self,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(mut switches) = self.section_table("switch-config").await else {
            return Ok(());
        };
        let interfaces = self
            .create_obj_type_dict("switch-interface-config", "switch", None)
            .await;
        let interface_aliases = self
            .create_obj_type_dict("switch-interface-alias", "switch-interface", None)
            .await;
        let flows = self.create_obj_type_dict("flow-entry", "switch", None).await;

        let wanted = match id {
            Some(id) => Some(self.convert_alias_to_object_key("switch-config", id).await),
            None => None,
        };
        if let Some(dpid) = &wanted {
            if !switches.iter().any(|s| &field_text(s, "dpid") == dpid) {
                return Err(CoreError::NotFound {
                    kind: "switch".into(),
                    id: dpid.clone(),
                });
            }
        }

        switches.sort_by(|a, b| compare_compound_keys(&field_text(a, "dpid"), &field_text(b, "dpid")));
        for switch in &switches {
            let dpid = field_text(switch, "dpid");
            if wanted.as_ref().is_some_and(|w| *w != dpid) {
                continue;
            }
            config.push_str(&format!("!\nswitch {dpid}\n"));
            self.include_alias(config, 1, "switch-config", &dpid).await;
            self.switch_settings(config, switch);

            let mut ports: Vec<&Row> = interfaces.get(&dpid).map(|v| v.iter().collect()).unwrap_or_default();
            ports.sort_by(|a, b| compare_compound_keys(&field_text(a, "name"), &field_text(b, "name")));
            for port in ports {
                let port_id = field_text(port, "id");
                let aliases = interface_aliases.get(&port_id).map(Vec::as_slice).unwrap_or_default();
                self.switch_interface(config, port, aliases);
            }

            let mut entries: Vec<&Row> = flows.get(&dpid).map(|v| v.iter().collect()).unwrap_or_default();
            entries.sort_by_key(|f| field_text(f, "name"));
            for flow in entries {
                self.flow_entry(config, flow);
            }
        }
        Ok(())
    }

    fn switch_settings(&self, config: &mut String, switch: &Row) {
        let mi = self.registry();
        let core = switch.get("core-switch").cloned().unwrap_or(Value::Null);
        if mi.not_default_value("switch-config", "core-switch", &core) && core == Value::Bool(true) {
            config.push_str(&format!("{}core-switch\n", indent(1)));
        }
        let tunnel = switch.get("tunnel-termination").cloned().unwrap_or(Value::Null);
        if !tunnel.is_null() && mi.not_default_value("switch-config", "tunnel-termination", &tunnel) {
            config.push_str(&format!("{}tunnel termination {}\n", indent(1), field_text(switch, "tunnel-termination")));
        }
    }

    fn switch_interface(&self, config: &mut String, port: &Row, aliases: &[Row]) {
        let mi = self.registry();
        let mut body = String::new();
        let mode = port.get("mode").cloned().unwrap_or(Value::Null);
        if !mode.is_null() && mi.not_default_value("switch-interface-config", "mode", &mode) {
            body.push_str(&format!("{}switchport mode {}\n", indent(2), field_text(port, "mode")));
        }
        if port.get("broadcast") == Some(&Value::Bool(true)) {
            body.push_str(&format!("{}broadcast\n", indent(2)));
        }
        for alias in aliases {
            body.push_str(&format!("{}interface-alias {}\n", indent(2), field_text(alias, "id")));
        }
        if !body.is_empty() {
            config.push_str(&format!("{}interface {}\n", indent(1), field_text(port, "name")));
            config.push_str(&body);
        }
    }

    fn flow_entry(&self, config: &mut String, flow: &Row) {
        config.push_str(&format!("{}flow-entry {}\n", indent(1), field_text(flow, "name")));
        for field in self.registry().obj_type_fields("flow-entry") {
            if FLOW_SKIPPED_FIELDS.contains(&field) {
                continue;
            }
            if let Some(value) = flow.get(field) {
                self.include_field(config, "flow-entry", field, value, 2, "");
            }
        }
    }
}
