// Host and static ARP sections

use indexmap::IndexMap;
use sdnsh_api::Row;

use crate::error::CoreError;
use crate::session::Session;
use crate::util::{field_text, quote_string};

/// Configuration hanging off configured hosts, keyed by host id.
#[derive(Debug, Default)]
struct HostExtras {
    aliases: IndexMap<String, Vec<Row>>,
    ip_bindings: IndexMap<String, Vec<Row>>,
    ap_bindings: IndexMap<String, Vec<Row>>,
}

/// The `host` command naming one configured host; the default address
/// space and an empty vlan are left out.
fn host_line(host: &Row) -> String {
    let mut line = String::from("host ");
    let space = field_text(host, "address-space");
    if !space.is_empty() && space != "default" {
        line.push_str(&format!("address-space {space} "));
    }
    let vlan = field_text(host, "vlan");
    if !vlan.is_empty() {
        line.push_str(&format!("vlan {vlan} "));
    }
    line.push_str(&field_text(host, "mac"));
    line
}

fn host_body(host_id: &str, extras: &HostExtras) -> String {
    let mut body = String::new();
    if let Some(alias) = extras.aliases.get(host_id).and_then(|rows| rows.first()) {
        body.push_str(&format!("  host-alias {}\n", field_text(alias, "id")));
    }
    for ip in extras.ip_bindings.get(host_id).into_iter().flatten() {
        body.push_str(&format!(
            "  security policy bind ip-address {}\n",
            field_text(ip, "ip-address")
        ));
    }
    for ap in extras.ap_bindings.get(host_id).into_iter().flatten() {
        let dpid = match field_text(ap, "dpid") {
            d if d.is_empty() => "all".to_owned(),
            d => d,
        };
        body.push_str(&format!(
            "  security policy bind attachment-point {dpid} {}\n",
            quote_string(&field_text(ap, "if-name-regex"))
        ));
    }
    body
}

impl Session {
    pub(super) async fn running_config_host(
        &self,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(hosts) = self.section_table("host-config").await else {
            return Ok(());
        };
        let extras = HostExtras {
            aliases: self.create_obj_type_dict("host-alias", "host", None).await,
            ip_bindings: self
                .create_obj_type_dict("host-security-ip-address", "host", None)
                .await,
            ap_bindings: self
                .create_obj_type_dict("host-security-attachment-point", "host", None)
                .await,
        };
        let key = self.registry().pk("host-config").unwrap_or("id");

        // a host may be named by its full key, its mac, or an alias
        let wanted = match id {
            Some(id) => Some(self.convert_alias_to_object_key("host-config", id).await),
            None => None,
        };
        let matches = |host: &Row, wanted: &str| {
            field_text(host, key) == wanted || field_text(host, "mac") == wanted
        };
        if let Some(wanted) = &wanted {
            if !hosts.iter().any(|h| matches(h, wanted)) {
                return Err(CoreError::NotFound {
                    kind: "host".into(),
                    id: wanted.clone(),
                });
            }
        }

        for host in &hosts {
            if wanted.as_ref().is_some_and(|w| !matches(host, w)) {
                continue;
            }
            config.push_str(&format!("!\n{}\n", host_line(host)));
            config.push_str(&host_body(&field_text(host, key), &extras));
        }
        Ok(())
    }

    pub(super) async fn running_config_static_arp(&self, config: &mut String) -> Result<(), CoreError> {
        let Some(arps) = self.section_table("static-arp").await else {
            return Ok(());
        };
        for (i, arp) in arps.iter().enumerate() {
            if i == 0 {
                config.push_str("!\n");
            }
            config.push_str(&format!("arp {} {}\n", field_text(arp, "ip"), field_text(arp, "mac")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn host_lines_qualify_non_defaults() {
        let plain = row(json!({"address-space": "default", "vlan": "", "mac": "00:00:00:00:00:01"}));
        assert_eq!(host_line(&plain), "host 00:00:00:00:00:01");

        let scoped = row(json!({"address-space": "red", "vlan": "10", "mac": "00:00:00:00:00:01"}));
        assert_eq!(
            host_line(&scoped),
            "host address-space red vlan 10 00:00:00:00:00:01"
        );
    }

    #[test]
    fn host_bodies_list_alias_and_bindings() {
        let id = "default||00:00:00:00:00:01";
        let mut extras = HostExtras::default();
        extras
            .aliases
            .insert(id.into(), vec![row(json!({"id": "web1", "host": id}))]);
        extras.ip_bindings.insert(
            id.into(),
            vec![row(json!({"host": id, "ip-address": "10.0.0.5"}))],
        );
        extras.ap_bindings.insert(
            id.into(),
            vec![
                row(json!({"host": id, "dpid": null, "if-name-regex": "eth.*"})),
                row(json!({"host": id, "dpid": "00:00:00:00:00:00:00:01", "if-name-regex": "a b"})),
            ],
        );
        assert_eq!(
            host_body(id, &extras),
            "  host-alias web1\n\
             \x20 security policy bind ip-address 10.0.0.5\n\
             \x20 security policy bind attachment-point all eth.*\n\
             \x20 security policy bind attachment-point 00:00:00:00:00:00:00:01 'a b'\n"
        );
    }

    #[test]
    fn hosts_without_extras_have_empty_bodies() {
        assert_eq!(host_body("x", &HostExtras::default()), "");
    }
}
