// ── REST query adapter ──
//
// `(obj_type, filters)` requests resolve either to a model-table read or,
// for synthetic obj-types, to a native controller endpoint whose JSON is
// reshaped into flat compound-keyed rows. Reshaping lives in the
// per-endpoint submodules as pure functions over the decoded reply.

mod device;
mod switch;
mod vns;

use std::collections::HashSet;

use sdnsh_api::{CachedBody, Lookup, Query, RestErrorInfo, Row};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::session::Session;
use crate::util::{compare_compound_keys, field_text, try_int, value_text};

/// Endpoint-side filter on one field: an exact value and/or a prefix.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FieldFilter<'a> {
    exact: Option<&'a str>,
    prefix: Option<&'a str>,
}

impl<'a> FieldFilter<'a> {
    pub(crate) fn from_query(query: &'a Query, field: &str) -> Self {
        Self {
            exact: query
                .value(field, Lookup::Eq)
                .or_else(|| query.value(field, Lookup::Exact)),
            prefix: query.value(field, Lookup::StartsWith),
        }
    }

    /// Case-folded copy, for endpoints whose names compare without case.
    pub(crate) fn lowercase(self) -> OwnedFieldFilter {
        OwnedFieldFilter {
            exact: self.exact.map(str::to_lowercase),
            prefix: self.prefix.map(str::to_lowercase),
        }
    }

    pub(crate) fn matches(&self, candidate: &str) -> bool {
        self.exact.is_none_or(|e| e == candidate)
            && self.prefix.is_none_or(|p| candidate.starts_with(p))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OwnedFieldFilter {
    exact: Option<String>,
    prefix: Option<String>,
}

impl OwnedFieldFilter {
    pub(crate) fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.exact.as_deref().is_none_or(|e| e == candidate)
            && self
                .prefix
                .as_deref()
                .is_none_or(|p| candidate.starts_with(p))
    }
}

/// Build a row from literal pairs.
pub(crate) fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

/// Decode a reply list one entry at a time, skipping entries of the
/// wrong shape.
pub(crate) fn decode_entries<T: DeserializeOwned>(obj_type: &str, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("get_model_from_url: {obj_type}: skipping entry: {e}");
                None
            }
        })
        .collect()
}

/// Append configured rows whose `key` is absent from the live `result`.
///
/// With a `query`, a configured row must also satisfy every filter term,
/// since the filters were written for the live endpoint rather than the
/// configuration table.
pub(crate) fn merge_config_rows(
    result: &mut Vec<Row>,
    config_rows: Vec<Row>,
    key: &str,
    query: Option<&Query>,
    mut patch: impl FnMut(&mut Row),
) {
    let known: HashSet<String> = result.iter().map(|r| field_text(r, key)).collect();
    for mut config in config_rows {
        if known.contains(&field_text(&config, key)) {
            continue;
        }
        if query.is_some_and(|q| !q.matches_row(&config)) {
            continue;
        }
        patch(&mut config);
        result.push(config);
    }
}

/// Order reshaped rows: by `orderby` (a leading `-` reverses), otherwise
/// by primary key, comparing `|` components integer-aware.
pub(crate) fn sort_rows(rows: &mut [Row], pk: &str, orderby: Option<&str>) {
    match orderby {
        Some(order) => {
            let (field, descending) = match order.strip_prefix('-') {
                Some(field) => (field, true),
                None => (order, false),
            };
            rows.sort_by(|a, b| {
                let (x, y) = (field_text(a, field), field_text(b, field));
                let ordering = try_int(&x).cmp(&try_int(&y));
                if descending { ordering.reverse() } else { ordering }
            });
        }
        None => {
            rows.sort_by(|a, b| compare_compound_keys(&field_text(a, pk), &field_text(b, pk)));
        }
    }
}

impl Session {
    /// Reject a decoded reply that carries an `error_type` dictionary.
    pub fn check_rest_result(&self, value: &Value) -> Result<(), CoreError> {
        let is_error = value
            .as_object()
            .and_then(|obj| obj.get("error_type"))
            .is_some_and(|t| !t.is_null());
        if !is_error {
            return Ok(());
        }
        let controller = self.store().controller().unwrap_or_default();
        match RestErrorInfo::from_value(&controller, value) {
            Some(info) => Err(CoreError::Rest(info)),
            None => Err(CoreError::Internal(format!("unreadable error reply: {value}"))),
        }
    }

    /// Rows of `obj_type` matching `filters`, through whichever path
    /// serves the type.
    pub async fn rest_query(&self, obj_type: &str, filters: &Row) -> Result<Vec<Row>, CoreError> {
        let mi = self.registry();
        if mi.obj_type_has_model(obj_type) {
            let query = Query::from_filters(filters);
            return Ok(self.store().rest_query_objects(obj_type, &query).await?);
        }
        self.get_model_from_url(obj_type, filters).await
    }

    /// Read a synthetic obj-type from its native endpoint and reshape the
    /// reply into rows.
    ///
    /// Transport and parse failures produce an empty result; the failed
    /// URL is cached as empty for the cache lifetime.
    pub async fn get_model_from_url(
        &self,
        obj_type: &str,
        filters: &Row,
    ) -> Result<Vec<Row>, CoreError> {
        let mi = self.registry();
        if mi.obj_type_has_model(obj_type) {
            debug!("get_model_from_url: {obj_type} is served by its model table");
            return Ok(Vec::new());
        }
        let endpoint = mi
            .obj_type_url(obj_type)
            .ok_or_else(|| CoreError::Description(format!("{obj_type}: no url or model")))?;

        let mut data = filters.clone();
        let orderby = data.remove("orderby").map(|v| value_text(&v));
        if endpoint == "device" && data.get("vlan").is_some_and(|v| v.as_str() == Some("")) {
            data.remove("vlan");
        }
        let query = Query::from_filters(&data);

        let mut url = self.store().rest_url(endpoint)?;
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.to_query_string());
        }
        debug!("get_model_from_url: request {obj_type} {url}");
        let entries = self.fetch_entries(&url).await;

        let pk = mi.pk(obj_type).unwrap_or("id");
        let mut result = match obj_type {
            "host-attachment-point" => device::attachment_point_rows(entries)?,
            "host-network-address" => device::network_address_rows(entries)?,
            "host" => {
                let mut rows = device::host_rows(entries, &query)?;
                let config = self.config_rows("host-config", &query).await;
                merge_config_rows(&mut rows, config, pk, Some(&query), |hc| {
                    for field in ["attachment-points", "dpid", "ips", "last-seen"] {
                        hc.insert(field.to_owned(), Value::Null);
                    }
                });
                rows
            }
            "host-vns-interface" => device::host_vns_interface_rows(entries, &query)?,
            "vns-interface" => {
                let mut rows = vns::vns_interface_rows(entries);
                let config = self.config_rows("vns-interface-config", &query).await;
                merge_config_rows(&mut rows, config, pk, None, |vi| {
                    vi.insert("rule".to_owned(), Value::String("default".to_owned()));
                });
                rows
            }
            "switches" => {
                let mastership = self.mastership().await;
                let mut rows = switch::switch_rows(entries, &query, &mastership);
                let config = self.config_rows("switch-config", &query).await;
                merge_config_rows(&mut rows, config, "dpid", Some(&query), |sw| {
                    for field in ["ip-address", "tcp-port", "connected-since"] {
                        sw.insert(field.to_owned(), Value::String(String::new()));
                    }
                });
                rows
            }
            "interfaces" => switch::interface_rows(entries, &query),
            other => {
                debug!("get_model_from_url: no reshaping for {other}");
                entries
                    .into_iter()
                    .filter_map(|e| match e {
                        Value::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect()
            }
        };

        sort_rows(&mut result, pk, orderby.as_deref());
        debug!("get_model_from_url: {obj_type} {url} {} rows", result.len());
        Ok(result)
    }

    /// GET a native endpoint as a JSON list, through the URL cache.
    async fn fetch_entries(&self, url: &str) -> Vec<Value> {
        let store = self.store();
        let reply = match store.rest_json_request(url).await {
            Ok(reply) => self.check_rest_result(&reply).map(|()| reply),
            Err(e) => Err(CoreError::from(e)),
        };
        match reply {
            Ok(Value::Array(items)) => items,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => vec![other],
            Err(e) => {
                debug!("get_model_from_url: failed request {url}: {e}");
                store.cache().save(url, CachedBody::Json(Value::Array(Vec::new())));
                Vec::new()
            }
        }
    }

    /// Configured rows for the merge step. Only terms on fields the
    /// configuration table has are sent; the rest are checked in memory.
    async fn config_rows(&self, config_obj_type: &str, query: &Query) -> Vec<Row> {
        let mi = self.registry();
        let mut sent = Query::new();
        for term in query.terms() {
            if mi.obj_type_has_field(config_obj_type, &term.field) {
                sent = sent.with(&term.field, term.lookup, &term.value);
            }
        }
        match self.store().rest_query_objects(config_obj_type, &sent).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("get_model_from_url: {config_obj_type}: {e}");
                Vec::new()
            }
        }
    }

    /// Switch mastership, dpid to the id of its master controller.
    async fn mastership(&self) -> switch::Mastership {
        let url = match self.store().rest_url("mastership") {
            Ok(url) => url,
            Err(_) => return switch::Mastership::default(),
        };
        match self.store().rest_json_request(&url).await {
            Ok(reply) if self.check_rest_result(&reply).is_ok() => switch::Mastership::from_reply(reply),
            Ok(_) => switch::Mastership::default(),
            Err(e) => {
                debug!("get_model_from_url: failed request {url}: {e}");
                switch::Mastership::default()
            }
        }
    }

    /// Check a cached switches reply for interface names that collide,
    /// exactly or without case. Each finding becomes a session warning.
    pub fn validate_switch(&self) -> Vec<String> {
        let Ok(url) = self.store().rest_url("switches") else {
            return Vec::new();
        };
        let Some(Value::Array(entries)) = self.store().cache().get_json(&url) else {
            return Vec::new();
        };
        let warnings = switch::switch_port_warnings(&decode_entries("switches", entries));
        for warning in &warnings {
            self.warn(warning.clone());
        }
        warnings
    }
}
