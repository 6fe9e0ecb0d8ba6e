// Query-string filters for the REST model API
//
// The model API filters with Django-style `field__lookup=value` query
// parameters. `Query` keeps the terms structured so callers that reshape
// results in memory can interpret the same filters they send.

use serde_json::Value;
use url::form_urlencoded;

use crate::Row;

/// A lookup suffix on a filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// `field=value`
    Eq,
    /// `field__exact=value`
    Exact,
    /// `field__startswith=value`
    StartsWith,
    /// `field__isnull=True`
    IsNull,
}

impl Lookup {
    fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Eq => None,
            Self::Exact => Some("exact"),
            Self::StartsWith => Some("startswith"),
            Self::IsNull => Some("isnull"),
        }
    }

    /// Split `name__lookup` into its parts. Unknown suffixes stay in the name.
    pub fn split_key(key: &str) -> (&str, Self) {
        if let Some((field, suffix)) = key.rsplit_once("__") {
            let lookup = match suffix {
                "exact" => Some(Self::Exact),
                "startswith" => Some(Self::StartsWith),
                "isnull" => Some(Self::IsNull),
                _ => None,
            };
            if let Some(lookup) = lookup {
                return (field, lookup);
            }
        }
        (key, Self::Eq)
    }

    /// Does `candidate` satisfy this lookup against `wanted`?
    pub fn matches(self, candidate: Option<&str>, wanted: &str) -> bool {
        match self {
            Self::Eq | Self::Exact => candidate == Some(wanted),
            Self::StartsWith => candidate.is_some_and(|c| c.starts_with(wanted)),
            Self::IsNull => candidate.is_none() == (wanted == "True"),
        }
    }
}

/// One `field__lookup=value` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub field: String,
    pub lookup: Lookup,
    pub value: String,
}

impl Term {
    /// The query-string key, e.g. `dpid__startswith`.
    pub fn key(&self) -> String {
        match self.lookup.suffix() {
            Some(suffix) => format!("{}__{suffix}", self.field),
            None => self.field.clone(),
        }
    }
}

/// An ordered set of filter terms plus an optional ordering field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<Term>,
    orderby: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from a field → value map.
    ///
    /// Keys may carry a lookup suffix. `null` values become
    /// `field__isnull=True` and an `orderby` key sets the ordering.
    pub fn from_filters(filters: &Row) -> Self {
        let mut query = Self::new();
        for (key, value) in filters {
            if key == "orderby" {
                query.orderby = value_to_param(value);
                continue;
            }
            match value_to_param(value) {
                None => query.push(key, Lookup::IsNull, "True"),
                Some(text) => {
                    let (field, lookup) = Lookup::split_key(key);
                    query.push(field, lookup, &text);
                }
            }
        }
        query
    }

    fn push(&mut self, field: &str, lookup: Lookup, value: &str) {
        self.terms.push(Term {
            field: field.to_owned(),
            lookup,
            value: value.to_owned(),
        });
    }

    // ── Builders ─────────────────────────────────────────────────────

    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.push(field, Lookup::Eq, value);
        self
    }

    pub fn exact(mut self, field: &str, value: &str) -> Self {
        self.push(field, Lookup::Exact, value);
        self
    }

    pub fn startswith(mut self, field: &str, value: &str) -> Self {
        self.push(field, Lookup::StartsWith, value);
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.push(field, Lookup::IsNull, "True");
        self
    }

    pub fn with(mut self, field: &str, lookup: Lookup, value: &str) -> Self {
        self.push(field, lookup, value);
        self
    }

    pub fn orderby(mut self, field: &str) -> Self {
        self.orderby = Some(field.to_owned());
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn order(&self) -> Option<&str> {
        self.orderby.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.orderby.is_none()
    }

    /// Value of the first term on `field` with the given lookup.
    pub fn value(&self, field: &str, lookup: Lookup) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| t.field == field && t.lookup == lookup)
            .map(|t| t.value.as_str())
    }

    /// Drop every term on `field`.
    pub fn without(mut self, field: &str) -> Self {
        self.terms.retain(|t| t.field != field);
        self
    }

    /// Does `row` satisfy every term? Used for rows assembled in memory.
    pub fn matches_row(&self, row: &Row) -> bool {
        self.terms.iter().all(|term| {
            let candidate = row.get(&term.field).and_then(value_to_param);
            term.lookup.matches(candidate.as_deref(), &term.value)
        })
    }

    /// Encode as `a=1&b__startswith=x`, without a leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for term in &self.terms {
            ser.append_pair(&term.key(), &term.value);
        }
        if let Some(ref field) = self.orderby {
            ser.append_pair("orderby", field);
        }
        ser.finish()
    }
}

/// Render a JSON scalar the way it appears in a query string.
pub(crate) fn value_to_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("True".into()),
        Value::Bool(false) => Some("False".into()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn filters_map_null_to_isnull() {
        let filters = json!({"switch": "00:01", "alias": null, "dpid__startswith": "00"});
        let query = Query::from_filters(filters.as_object().unwrap());
        assert_eq!(query.value("alias", Lookup::IsNull), Some("True"));
        assert_eq!(query.value("dpid", Lookup::StartsWith), Some("00"));
        assert_eq!(query.value("switch", Lookup::Eq), Some("00:01"));
    }

    #[test]
    fn query_string_is_form_encoded() {
        let query = Query::new()
            .startswith("name", "a b")
            .eq("vlan", "10")
            .orderby("-name");
        assert_eq!(
            query.to_query_string(),
            "name__startswith=a+b&vlan=10&orderby=-name"
        );
    }

    #[test]
    fn split_key_keeps_unknown_suffix() {
        assert_eq!(Lookup::split_key("mac__exact"), ("mac", Lookup::Exact));
        assert_eq!(Lookup::split_key("foo__bar"), ("foo__bar", Lookup::Eq));
    }

    #[test]
    fn in_memory_matching() {
        let row = json!({"id": "sw1", "core": true});
        let row = row.as_object().unwrap();
        assert!(Query::new().startswith("id", "sw").matches_row(row));
        assert!(Query::new().eq("core", "True").matches_row(row));
        assert!(Query::new().is_null("alias").matches_row(row));
        assert!(!Query::new().exact("id", "sw").matches_row(row));
    }
}
