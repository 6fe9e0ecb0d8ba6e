// ── Object-model registry boundary ──
//
// The shell consults schema metadata for every obj-type it touches:
// primary keys (simple or compound), foreign keys, alias tables, field
// case and declared defaults. `ModelRegistry` is the read-only view the
// rest of the crate uses; `Catalog` is the data-driven implementation
// shipped with the crate.

mod catalog;

pub use catalog::Catalog;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::key::{CompoundKey, SEPARATOR};
use crate::util::{Case, value_text, values_equal};
use sdnsh_api::Row;

// ── Descriptors ──────────────────────────────────────────────────────

/// Storage kind of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    String,
    Integer,
    Boolean,
    DateTime,
    ForeignKey,
    /// Primary key assembled by the store from its component fields.
    CompoundKey,
    List,
}

/// Schema metadata for one field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FieldInfo {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Target obj-type of a foreign key.
    pub rel_obj_type: Option<String>,
    /// Target field of a foreign key; the target's primary key when absent.
    pub rel_field: Option<String>,
    /// Component fields when this field's value is a compound key.
    pub compound: Option<Vec<String>>,
    pub separator: Option<char>,
    pub default: Option<Value>,
    pub null: bool,
    pub case: Option<Case>,
    pub verbose_name: Option<String>,
    /// Hidden in detail views unless debugging.
    pub internal: bool,
}

/// Schema metadata for one obj-type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ObjTypeInfo {
    pub pk: Option<String>,
    /// REST path (under `/rest/v1/`) for synthetic types with no model table.
    pub url: Option<String>,
    /// Table holding configured data for a synthetic type.
    pub config_obj_type: Option<String>,
    pub fields: IndexMap<String, FieldInfo>,
}

// ── Registry trait ───────────────────────────────────────────────────

/// Read-only schema queries.
///
/// Implementors provide the raw lookups; everything else is derived by the
/// provided methods so alternative registries behave identically.
pub trait ModelRegistry: Send + Sync + std::fmt::Debug {
    fn obj_type_info(&self, obj_type: &str) -> Option<&ObjTypeInfo>;

    /// Every known obj-type name.
    fn obj_type_names(&self) -> Vec<&str>;

    /// Alias obj-types that translate values for `obj_type`.
    fn alias_obj_type_xref(&self, obj_type: &str) -> &[String];

    fn is_alias_obj_type(&self, obj_type: &str) -> bool;

    // ── Obj-type queries ─────────────────────────────────────────────

    fn obj_type_exists(&self, obj_type: &str) -> bool {
        self.obj_type_info(obj_type).is_some()
    }

    fn pk(&self, obj_type: &str) -> Option<&str> {
        self.obj_type_info(obj_type)?.pk.as_deref()
    }

    /// Backed by a model table (as opposed to a reshaped native endpoint).
    fn obj_type_has_model(&self, obj_type: &str) -> bool {
        self.obj_type_info(obj_type)
            .is_some_and(|info| info.url.is_none())
    }

    fn obj_type_url(&self, obj_type: &str) -> Option<&str> {
        self.obj_type_info(obj_type)?.url.as_deref()
    }

    fn obj_type_has_field(&self, obj_type: &str, field: &str) -> bool {
        self.field_info(obj_type, field).is_some()
    }

    fn obj_type_fields(&self, obj_type: &str) -> Vec<&str> {
        self.obj_type_info(obj_type)
            .map(|info| info.fields.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn field_info(&self, obj_type: &str, field: &str) -> Option<&FieldInfo> {
        self.obj_type_info(obj_type)?.fields.get(field)
    }

    /// The table holding configured rows for `obj_type`: itself when it
    /// has a model, otherwise its declared config table.
    fn obj_type_related_config_obj_type<'a>(&'a self, obj_type: &'a str) -> Option<&'a str> {
        let info = self.obj_type_info(obj_type)?;
        if info.url.is_none() {
            return Some(obj_type);
        }
        info.config_obj_type.as_deref()
    }

    // ── Field queries ────────────────────────────────────────────────

    fn is_primary_key(&self, obj_type: &str, field: &str) -> bool {
        self.pk(obj_type) == Some(field)
    }

    fn is_foreign_key(&self, obj_type: &str, field: &str) -> bool {
        self.field_info(obj_type, field)
            .is_some_and(|f| f.kind == FieldKind::ForeignKey && f.rel_obj_type.is_some())
    }

    /// `(target obj-type, target field)` of a foreign key.
    fn foreign_key_references(&self, obj_type: &str, field: &str) -> Option<(&str, &str)> {
        let info = self.field_info(obj_type, field)?;
        if info.kind != FieldKind::ForeignKey {
            return None;
        }
        let target = info.rel_obj_type.as_deref()?;
        let target_field = match info.rel_field.as_deref() {
            Some(f) => f,
            None => self.pk(target)?,
        };
        Some((target, target_field))
    }

    fn obj_type_foreign_keys(&self, obj_type: &str) -> Vec<&str> {
        self.obj_type_info(obj_type)
            .map(|info| {
                info.fields
                    .iter()
                    .filter(|(_, f)| f.kind == FieldKind::ForeignKey)
                    .map(|(name, _)| name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The foreign key of an alias table, when it has exactly one.
    fn alias_obj_type_field(&self, alias_obj_type: &str) -> Option<&str> {
        match self.obj_type_foreign_keys(alias_obj_type).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn is_field_boolean(&self, obj_type: &str, field: &str) -> bool {
        self.field_info(obj_type, field)
            .is_some_and(|f| f.kind == FieldKind::Boolean)
    }

    fn is_integer_field(&self, obj_type: &str, field: &str) -> bool {
        self.field_info(obj_type, field)
            .is_some_and(|f| f.kind == FieldKind::Integer)
    }

    fn is_null_allowed(&self, obj_type: &str, field: &str) -> bool {
        self.field_info(obj_type, field).is_some_and(|f| f.null)
    }

    fn field_default_value(&self, obj_type: &str, field: &str) -> Option<&Value> {
        self.field_info(obj_type, field)?.default.as_ref()
    }

    fn get_obj_type_field_case_sensitive(&self, obj_type: &str, field: &str) -> Option<Case> {
        self.field_info(obj_type, field)?.case
    }

    fn verbose_name(&self, obj_type: &str, field: &str) -> Option<&str> {
        self.field_info(obj_type, field)?.verbose_name.as_deref()
    }

    /// A value worth emitting: anything non-empty for nullable fields,
    /// anything differing from a declared default otherwise.
    fn not_default_value(&self, obj_type: &str, field: &str, value: &Value) -> bool {
        if self.is_null_allowed(obj_type, field) {
            return !value.is_null() && value_text(value) != "";
        }
        match self.field_default_value(obj_type, field) {
            Some(default) => !values_equal(value, default),
            None => false,
        }
    }

    // ── Compound keys ────────────────────────────────────────────────

    /// Component layout of a compound-key field. A foreign key without its
    /// own layout borrows the layout of the field it references.
    fn compound_key_layout(&self, obj_type: &str, field: &str) -> Option<(&[String], char)> {
        let info = self.field_info(obj_type, field)?;
        if let Some(parts) = info.compound.as_deref() {
            return Some((parts, info.separator.unwrap_or(SEPARATOR)));
        }
        let (target, target_field) = self.foreign_key_references(obj_type, field)?;
        let target_info = self.field_info(target, target_field)?;
        target_info
            .compound
            .as_deref()
            .map(|parts| (parts, target_info.separator.unwrap_or(SEPARATOR)))
    }

    fn is_compound_key(&self, obj_type: &str, field: &str) -> bool {
        self.compound_key_layout(obj_type, field).is_some()
    }

    /// A compound key the client assembles itself, as opposed to one the
    /// store builds from the component columns.
    fn is_primitive_compound_key(&self, obj_type: &str, field: &str) -> bool {
        self.is_compound_key(obj_type, field)
            && self
                .field_info(obj_type, field)
                .is_some_and(|f| f.kind != FieldKind::CompoundKey)
    }

    fn compound_key_separator(&self, obj_type: &str, field: &str) -> Option<char> {
        self.compound_key_layout(obj_type, field).map(|(_, sep)| sep)
    }

    fn compound_key_fields(&self, obj_type: &str, field: &str) -> Option<Vec<String>> {
        self.compound_key_layout(obj_type, field)
            .map(|(parts, _)| parts.to_vec())
    }

    /// Compound-key components with foreign-key components expanded into
    /// the components of the key they reference.
    fn deep_compound_key_fields(&self, obj_type: &str, field: &str) -> Vec<String> {
        let mut parts = Vec::new();
        deep_fields(self, obj_type, field, &mut parts);
        parts
    }

    /// Split the compound value of `key` in `row` and add each named
    /// component to the row.
    ///
    /// Components already present keep their value unless they are foreign
    /// keys. A length mismatch is only reported when `is_prefix` is false.
    fn split_compound_into_dict(&self, obj_type: &str, key: &str, row: &mut Row, is_prefix: bool) {
        let names = self.deep_compound_key_fields(obj_type, key);
        let separator = self.compound_key_separator(obj_type, key).unwrap_or(SEPARATOR);
        let Some(value) = row.get(key).map(value_text) else {
            return;
        };
        let values = CompoundKey::parse(&value, separator).into_parts();

        if names.len() != values.len() && !is_prefix {
            warn!("{obj_type}: {key}: compound length mismatch: {names:?} {values:?}");
        }
        for (name, part) in names.iter().zip(values) {
            match row.get(name) {
                Some(existing) if name != key => {
                    if value_text(existing) != part {
                        if self.is_foreign_key(obj_type, name) {
                            row.insert(name.clone(), Value::String(part));
                        } else {
                            warn!(
                                "compound split dict has different value: {name} found {} expected {part}",
                                value_text(existing)
                            );
                        }
                    }
                }
                _ => {
                    row.insert(name.clone(), Value::String(part));
                }
            }
        }
    }
}

fn deep_fields<R: ModelRegistry + ?Sized>(
    registry: &R,
    obj_type: &str,
    field: &str,
    parts: &mut Vec<String>,
) {
    if registry.is_foreign_key(obj_type, field) {
        if let Some((target, target_field)) = registry.foreign_key_references(obj_type, field) {
            if registry.is_compound_key(target, target_field) {
                deep_fields(registry, target, target_field, parts);
            }
        }
        return;
    }
    let Some(components) = registry.compound_key_fields(obj_type, field) else {
        return;
    };
    for component in components {
        let target = registry
            .foreign_key_references(obj_type, &component)
            .filter(|(t, f)| registry.is_compound_key(t, f));
        match target {
            Some((t, f)) => deep_fields(registry, t, f, parts),
            None => parts.push(component),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    #[test]
    fn foreign_keys_resolve_to_target_pk() {
        let mi = catalog();
        assert_eq!(
            mi.foreign_key_references("switch-alias", "switch"),
            Some(("switch-config", "dpid"))
        );
        assert_eq!(mi.alias_obj_type_field("switch-alias"), Some("switch"));
        assert_eq!(mi.alias_obj_type_field("flow-entry"), Some("switch"));
        assert_eq!(mi.alias_obj_type_field("tenant"), None);
    }

    #[test]
    fn deep_fields_expand_foreign_compound_keys() {
        let mi = catalog();
        assert_eq!(
            mi.deep_compound_key_fields("firewall-rule", "id"),
            ["controller", "type", "number", "src-ip", "vrrp-ip", "port", "proto"]
        );
        assert_eq!(
            mi.deep_compound_key_fields("vns-access-list-entry", "id"),
            ["tenant", "vnsname", "name", "rule"]
        );
        assert_eq!(
            mi.deep_compound_key_fields("host-security-ip-address", "host"),
            ["address-space", "vlan", "mac"]
        );
    }

    #[test]
    fn every_compound_key_round_trips() {
        let mi = catalog();
        for obj_type in mi.obj_type_names() {
            let Some(pk) = mi.pk(obj_type) else { continue };
            if !mi.is_compound_key(obj_type, pk) {
                continue;
            }
            let names = mi.deep_compound_key_fields(obj_type, pk);
            let id = CompoundKey::new(names.iter().map(|n| format!("v-{n}"))).to_string();

            let mut row = Row::new();
            row.insert(pk.to_owned(), json!(id));
            mi.split_compound_into_dict(obj_type, pk, &mut row, false);

            let rejoined = CompoundKey::new(names.iter().map(|n| value_text(&row[n.as_str()])));
            assert_eq!(rejoined.to_string(), id, "{obj_type}");
        }
    }

    #[test]
    fn split_keeps_existing_non_fk_values() {
        let mi = catalog();
        let mut row = Row::new();
        row.insert("id".into(), json!("default|vns1"));
        row.insert("vnsname".into(), json!("other"));
        mi.split_compound_into_dict("vns-definition", "id", &mut row, false);
        assert_eq!(row["tenant"], json!("default"));
        assert_eq!(row["vnsname"], json!("other"));
    }

    #[test]
    fn split_prefix_fills_available_components() {
        let mi = catalog();
        let mut row = Row::new();
        row.insert("id".into(), json!("c1"));
        mi.split_compound_into_dict("controller-interface", "id", &mut row, true);
        assert_eq!(row["controller"], json!("c1"));
        assert!(!row.contains_key("type"));
    }

    #[test]
    fn default_detection() {
        let mi = catalog();
        assert!(!mi.not_default_value("flow-entry", "priority", &json!(32768)));
        assert!(mi.not_default_value("flow-entry", "priority", &json!(100)));
        assert!(!mi.not_default_value("flow-entry", "src-mac", &json!("")));
        assert!(mi.not_default_value("flow-entry", "src-mac", &json!("00:00:00:00:00:01")));
        assert!(!mi.not_default_value("tenant", "active", &json!(true)));
    }

    #[test]
    fn primitive_compound_keys() {
        let mi = catalog();
        assert!(mi.is_primitive_compound_key("interfaces", "id"));
        assert!(!mi.is_primitive_compound_key("switch-interface-config", "id"));
        assert!(mi.is_compound_key("host-security-ip-address", "host"));
    }

    #[test]
    fn related_config_types() {
        let mi = catalog();
        assert_eq!(mi.obj_type_related_config_obj_type("host"), Some("host-config"));
        assert_eq!(
            mi.obj_type_related_config_obj_type("switch-config"),
            Some("switch-config")
        );
        assert!(!mi.obj_type_has_model("switches"));
    }
}
