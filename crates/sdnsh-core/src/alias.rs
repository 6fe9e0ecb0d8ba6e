// ── Alias middleware ──
//
// Aliases are human names for canonical keys (`sw1` for a dpid, `web` for a
// host id). Alias tables are ordinary model tables; this module resolves
// names in both directions and keeps the display caches the formatters
// read. Every lookup here is advisory: failures read as "no alias".

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use sdnsh_api::{Lookup, Query, Row};
use serde::Deserialize;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::error::CoreError;
use crate::session::Session;
use crate::util::{convert_case, field_text, quote_string, value_text};

// ── Alias families ───────────────────────────────────────────────────

/// A display cache the formatters can consult.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AliasFamily {
    /// host id → host alias
    Host,
    /// dpid → switch alias
    Switch,
    /// `dpid.portNumber` → port name
    Port,
    /// static flow-entry cookie hash → flow name
    Flow,
    /// controller id → controller alias
    ControllerNode,
}

impl AliasFamily {
    /// The table whose alias tables feed this family.
    pub fn config_obj_type(self) -> Option<&'static str> {
        match self {
            Self::Host => Some("host-config"),
            Self::Switch => Some("switch-config"),
            Self::ControllerNode => Some("controller-node"),
            Self::Port | Self::Flow => None,
        }
    }
}

/// The set of alias families a formatter needs refreshed before rendering.
pub type AliasFamilies = BTreeSet<AliasFamily>;

/// Per-family key → display-name tables.
#[derive(Debug, Default)]
pub struct AliasCache {
    tables: RwLock<HashMap<AliasFamily, HashMap<String, String>>>,
}

impl AliasCache {
    pub fn replace(&self, family: AliasFamily, table: HashMap<String, String>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(family, table);
    }

    pub fn lookup(&self, family: AliasFamily, key: &str) -> Option<String> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&family)
            .and_then(|t| t.get(key))
            .cloned()
    }

    /// A copy of one family's table.
    pub fn table(&self, family: AliasFamily) -> HashMap<String, String> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&family)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Cookie hash the flow pusher derives from a static flow-entry name.
pub fn flow_hash(name: &str) -> u32 {
    let mut hash: u64 = 2311;
    for c in name.chars() {
        hash = (hash.wrapping_mul(211).wrapping_add(u64::from(u32::from(c)))) & 0xf_ffff;
    }
    u32::try_from(hash & 0xf_ffff).unwrap_or_default()
}

/// REST url of a controller's log listing, or of one log.
pub fn log_url(ip_and_port: &str, log: Option<&str>) -> String {
    match log {
        Some(log) => format!("http://{ip_and_port}/rest/v1/system/log/{log}"),
        None => format!("http://{ip_and_port}/rest/v1/system/log"),
    }
}

// ── Session operations ───────────────────────────────────────────────

impl Session {
    /// Read `obj_type` and group its rows by `field`.
    ///
    /// `filter` restricts the read with a `key__startswith=value` term.
    pub async fn create_obj_type_dict(
        &self,
        obj_type: &str,
        field: &str,
        filter: Option<(&str, &str)>,
    ) -> IndexMap<String, Vec<Row>> {
        let mi = self.registry();
        if !mi.obj_type_has_field(obj_type, field) {
            return IndexMap::new();
        }
        let rows = if mi.obj_type_has_model(obj_type) {
            self.store()
                .get_table_from_store(obj_type, filter, Lookup::StartsWith)
                .await
                .map_err(CoreError::from)
        } else {
            let mut data = Row::new();
            if let Some((key, value)) = filter.filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
                data.insert(key.to_owned(), Value::String(value.to_owned()));
            }
            self.get_model_from_url(obj_type, &data).await
        };
        group_rows(self.advisory(obj_type, rows), field)
    }

    /// Like [`create_obj_type_dict`](Self::create_obj_type_dict) with a
    /// multi-field query.
    pub async fn create_obj_type_dict_query(
        &self,
        obj_type: &str,
        field: &str,
        filters: &Row,
    ) -> IndexMap<String, Vec<Row>> {
        if !self.registry().obj_type_has_field(obj_type, field) {
            return IndexMap::new();
        }
        let rows = self.rest_query(obj_type, filters).await;
        group_rows(self.advisory(obj_type, rows), field)
    }

    fn advisory(&self, obj_type: &str, rows: Result<Vec<Row>, CoreError>) -> Vec<Row> {
        rows.unwrap_or_else(|e| {
            debug!("{obj_type}: {e}");
            Vec::new()
        })
    }

    /// The value an alias stands for, or `None`.
    pub async fn alias_lookup(&self, alias_obj_type: &str, alias_id: &str) -> Option<String> {
        let mi = self.registry();
        let Some(field) = mi.alias_obj_type_field(alias_obj_type) else {
            debug!("no field for alias {alias_obj_type}");
            return None;
        };
        let key = mi.pk(alias_obj_type)?;
        let rows = self
            .store()
            .get_table_from_store(alias_obj_type, Some((key, alias_id)), Lookup::Exact)
            .await
            .ok()?;
        match rows.as_slice() {
            [row] => Some(field_text(row, field)).filter(|v| !v.is_empty()),
            _ => None,
        }
    }

    /// Translate `name_or_alias` into the canonical key of `obj_type` when
    /// one of its alias tables knows the name; otherwise return it as is.
    pub async fn convert_alias_to_object_key(&self, obj_type: &str, name_or_alias: &str) -> String {
        let aliases = self.registry().alias_obj_type_xref(obj_type);
        if aliases.is_empty() || self.is_reserved_word(name_or_alias) {
            return name_or_alias.to_owned();
        }
        for alias in aliases {
            if let Some(value) = self.alias_lookup(alias, name_or_alias).await {
                return value;
            }
        }
        name_or_alias.to_owned()
    }

    /// Add the aliases starting with `text` to `entries`, removing any raw
    /// key an added alias stands for.
    pub async fn alias_choices_for_alias_obj_type(
        &self,
        mut entries: Vec<String>,
        obj_type: &str,
        text: &str,
    ) -> Vec<String> {
        let mi = self.registry();
        for alias in mi.alias_obj_type_xref(obj_type) {
            let (Some(key), Some(alias_field)) = (mi.pk(alias), mi.alias_obj_type_field(alias))
            else {
                continue;
            };
            let alias_dict = self.create_obj_type_dict(alias, key, Some((key, text))).await;
            for (item, rows) in alias_dict {
                if let Some(target) = rows.first().map(|r| field_text(r, alias_field)) {
                    entries.retain(|e| *e != target);
                }
                entries.push(item);
            }
        }
        entries
    }

    /// The alias naming `foreign_key`, when exactly one does.
    pub async fn alias_lookup_with_foreign_key(
        &self,
        alias_obj_type: &str,
        foreign_key: &str,
    ) -> Option<String> {
        let mi = self.registry();
        let field = mi.alias_obj_type_field(alias_obj_type)?;
        let pk = mi.pk(alias_obj_type)?;
        let rows = self
            .store()
            .get_table_from_store(alias_obj_type, Some((field, foreign_key)), Lookup::Exact)
            .await
            .map_err(|e| debug!("{alias_obj_type}: {e}"))
            .ok()?;
        match rows.as_slice() {
            [row] => Some(field_text(row, pk)),
            _ => None,
        }
    }

    // ── Display caches ───────────────────────────────────────────────

    /// Rebuild the key → alias table for `family` from its alias tables.
    pub async fn update_show_alias(&self, family: AliasFamily) {
        let Some(obj_type) = family.config_obj_type() else {
            return;
        };
        let mi = self.registry();
        let mut table = HashMap::new();
        for alias in mi.alias_obj_type_xref(obj_type) {
            let (Some(field), Some(key)) = (mi.alias_obj_type_field(alias), mi.pk(alias)) else {
                debug!("alias table {alias} has no single foreign key");
                continue;
            };
            let rows = self
                .store()
                .get_table_from_store(alias, None, Lookup::Eq)
                .await
                .unwrap_or_default();
            for row in rows {
                table.insert(field_text(&row, field), field_text(&row, key));
            }
        }
        debug!("{family} alias table: {} entries", table.len());
        self.aliases().replace(family, table);
    }

    /// `dpid.portNumber` → port name for every live interface.
    pub async fn update_switch_port_name_cache(&self) {
        let ports = match self.get_model_from_url("interfaces", &Row::new()).await {
            Ok(ports) => ports,
            Err(e) => {
                self.warn(e.to_string());
                return;
            }
        };
        let table = ports
            .iter()
            .map(|port| {
                (
                    format!("{}.{}", field_text(port, "switch"), field_text(port, "portNumber")),
                    field_text(port, "portName"),
                )
            })
            .collect();
        self.aliases().replace(AliasFamily::Port, table);
    }

    /// Cookie hash → name for every static flow entry.
    pub async fn update_flow_cookie_hash(&self) {
        let flows = self
            .store()
            .get_table_from_store("flow-entry", None, Lookup::Eq)
            .await
            .unwrap_or_default();
        let table = flows
            .iter()
            .map(|flow| {
                let name = field_text(flow, "name");
                (flow_hash(&name).to_string(), name)
            })
            .collect();
        self.aliases().replace(AliasFamily::Flow, table);
    }

    pub async fn refresh_alias_family(&self, family: AliasFamily) {
        match family {
            AliasFamily::Port => self.update_switch_port_name_cache().await,
            AliasFamily::Flow => self.update_flow_cookie_hash().await,
            AliasFamily::Host | AliasFamily::Switch | AliasFamily::ControllerNode => {
                self.update_show_alias(family).await;
            }
        }
    }

    pub async fn refresh_alias_families(&self, families: &AliasFamilies) {
        for family in families {
            self.refresh_alias_family(*family).await;
        }
    }

    /// Refresh the caches the formatters of `format` depend on.
    pub async fn obj_type_show_alias_update(&self, format: &str) {
        let families = self.formats().format_to_alias_update(format);
        self.refresh_alias_families(&families).await;
    }

    // ── Object choices ───────────────────────────────────────────────

    /// Quoted values of `key` (the primary key by default) starting with
    /// `text`, with aliases standing in for the keys they name.
    pub async fn objects_starting_with(
        &self,
        obj_type: &str,
        text: &str,
        key: Option<&str>,
    ) -> Vec<String> {
        let mi = self.registry();
        let key = match key {
            Some(key) => {
                if !mi.obj_type_has_field(obj_type, key) {
                    debug!("objects_starting_with: {obj_type} doesn't have field {key}");
                }
                key
            }
            None => match mi.pk(obj_type) {
                Some(pk) => pk,
                None => {
                    debug!("objects_starting_with: {obj_type} doesn't have pk");
                    return Vec::new();
                }
            },
        };
        let id_value = convert_case(mi.get_obj_type_field_case_sensitive(obj_type, key), text);

        let entries = if mi.obj_type_has_model(obj_type) {
            match self
                .store()
                .get_table_from_store(obj_type, Some((key, id_value.as_str())), Lookup::StartsWith)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    debug!("objects_starting_with: {obj_type}: {e}");
                    return Vec::new();
                }
            }
        } else {
            let mut data = Row::new();
            if !id_value.is_empty() {
                data.insert(format!("{key}__startswith"), Value::String(id_value.clone()));
            }
            self.get_model_from_url(obj_type, &data)
                .await
                .unwrap_or_default()
        };

        let mut key_entries: Vec<String> = Vec::new();
        for row in &entries {
            let values: Vec<String> = match row.get(key) {
                Some(Value::Array(items)) => items.iter().map(value_text).collect(),
                Some(value) => vec![value_text(value)],
                None => Vec::new(),
            };
            for value in values.into_iter().filter(|v| !v.is_empty()) {
                if value.starts_with(&id_value) {
                    let quoted = quote_string(&value);
                    if !key_entries.contains(&quoted) {
                        key_entries.push(quoted);
                    }
                }
            }
        }

        let alias_obj_type = if mi.pk(obj_type) == Some(key) {
            Some(obj_type)
        } else {
            mi.foreign_key_references(obj_type, key).map(|(t, _)| t)
        };
        match alias_obj_type.and_then(|t| mi.obj_type_related_config_obj_type(t)) {
            Some(config) => {
                self.alias_choices_for_alias_obj_type(key_entries, config, text)
                    .await
            }
            None => key_entries,
        }
    }

    // ── Controller addressing ────────────────────────────────────────

    /// The id of the controller this session talks to.
    pub async fn this_controller_id(&self) -> Result<String, CoreError> {
        let url = self.store().rest_url("system/controller")?;
        let reply = self.store().rest_json_request(&url).await?;
        self.check_rest_result(&reply)?;
        Ok(reply.get("id").map(value_text).unwrap_or_default())
    }

    /// Controller interfaces whose firewall admits every `(proto, port)`
    /// pair. `controller` names one controller, `"all"` spans every
    /// controller, `None` means this one.
    pub async fn local_interfaces_firewall_open(
        &self,
        protos: &[&str],
        ports: &[u16],
        controller: Option<&str>,
    ) -> Result<Vec<Row>, CoreError> {
        let mut open = std::collections::HashSet::new();
        for proto in protos {
            for port in ports {
                let query = Query::new().eq("proto", proto).eq("port", &port.to_string());
                for rule in self.store().rest_query_objects("firewall-rule", &query).await? {
                    open.insert(field_text(&rule, "interface"));
                }
            }
        }

        let controller = match controller {
            Some(c) => c.to_owned(),
            None => self.this_controller_id().await?,
        };
        let query = if controller == "all" {
            Query::new()
        } else {
            Query::new().eq("controller", &controller)
        };
        let interfaces = self
            .store()
            .rest_query_objects("controller-interface", &query)
            .await?;
        Ok(interfaces
            .into_iter()
            .filter(|ifn| open.contains(&field_text(ifn, "id")))
            .collect())
    }

    /// `ip:port` endpoints for reaching `controller`'s REST API: every
    /// interface open on tcp/80 or tcp/8000 with an address. This
    /// controller is reached through loopback.
    pub async fn controller_ip_and_port(
        &self,
        controller: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        let this_controller = self.this_controller_id().await?;
        let mut endpoints = Vec::new();
        for port in [80_u16, 8000] {
            let interfaces = self
                .local_interfaces_firewall_open(&["tcp"], &[port], controller)
                .await?;
            for ifn in interfaces {
                let ip = field_text(&ifn, "ip");
                let discovered = field_text(&ifn, "discovered-ip");
                if ip.is_empty() && discovered.is_empty() {
                    continue;
                }
                let host = if field_text(&ifn, "controller") == this_controller {
                    "127.0.0.1".to_owned()
                } else if discovered.is_empty() {
                    ip
                } else {
                    discovered
                };
                endpoints.push(format!("{host}:{port}"));
            }
        }
        Ok(endpoints)
    }
}

fn group_rows(rows: Vec<Row>, field: &str) -> IndexMap<String, Vec<Row>> {
    let mut grouped: IndexMap<String, Vec<Row>> = IndexMap::new();
    for row in rows {
        let Some(value) = row.get(field).map(value_text) else {
            continue;
        };
        grouped.entry(value).or_default().push(row);
    }
    grouped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn flow_hash_is_twenty_bits() {
        let h = flow_hash("flow-to-web");
        assert!(h < (1 << 20));
        assert_eq!(flow_hash("a"), (2311 * 211 + 97) & 0xf_ffff);
    }

    #[test]
    fn log_urls() {
        assert_eq!(log_url("10.0.0.1:80", None), "http://10.0.0.1:80/rest/v1/system/log");
        assert_eq!(
            log_url("10.0.0.1:80", Some("syslog")),
            "http://10.0.0.1:80/rest/v1/system/log/syslog"
        );
    }

    #[test]
    fn cache_tables_replace_wholesale() {
        let cache = AliasCache::default();
        cache.replace(AliasFamily::Switch, HashMap::from([("00:01".into(), "sw1".into())]));
        assert_eq!(cache.lookup(AliasFamily::Switch, "00:01").as_deref(), Some("sw1"));
        cache.replace(AliasFamily::Switch, HashMap::new());
        assert_eq!(cache.lookup(AliasFamily::Switch, "00:01"), None);
    }

    #[test]
    fn family_names() {
        assert_eq!(AliasFamily::ControllerNode.to_string(), "controller-node");
        assert_eq!("port".parse::<AliasFamily>().unwrap(), AliasFamily::Port);
    }

    #[test]
    fn grouping_skips_rows_without_the_field() {
        let rows = vec![
            json!({"host": "a", "id": 1}).as_object().unwrap().clone(),
            json!({"host": "a", "id": 2}).as_object().unwrap().clone(),
            json!({"id": 3}).as_object().unwrap().clone(),
        ];
        let grouped = group_rows(rows, "host");
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["a"].len(), 2);
    }
}
