// Data-driven model catalog
//
// Obj-type descriptors are loaded from TOML (the built-in catalog ships
// inside the crate). Alias cross-references are derived once at load time
// from the foreign-key structure.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::{FieldKind, ModelRegistry, ObjTypeInfo};
use crate::error::CoreError;

const BUILTIN: &str = include_str!("catalog.toml");

/// A [`ModelRegistry`] backed by an in-memory table of descriptors.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: IndexMap<String, ObjTypeInfo>,
    alias_xref: HashMap<String, Vec<String>>,
    alias_types: Vec<String>,
}

impl Catalog {
    /// The catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_toml(BUILTIN)
    }

    pub fn from_toml(text: &str) -> Result<Self, CoreError> {
        let types: IndexMap<String, ObjTypeInfo> =
            toml::from_str(text).map_err(|e| CoreError::Config {
                message: format!("model catalog: {e}"),
            })?;
        Ok(Self::from_types(types))
    }

    pub fn from_types(types: IndexMap<String, ObjTypeInfo>) -> Self {
        let mut catalog = Self {
            types,
            ..Self::default()
        };
        catalog.init_alias_obj_type_xref();
        catalog
    }

    /// Add descriptors from another source. Fields merge into existing
    /// obj-types; new obj-types are appended.
    pub fn merge(&mut self, other: IndexMap<String, ObjTypeInfo>) {
        for (name, info) in other {
            match self.types.get_mut(&name) {
                Some(existing) => {
                    existing.pk = info.pk.or(existing.pk.take());
                    existing.url = info.url.or(existing.url.take());
                    existing.config_obj_type =
                        info.config_obj_type.or(existing.config_obj_type.take());
                    existing.fields.extend(info.fields);
                }
                None => {
                    self.types.insert(name, info);
                }
            }
        }
        self.init_alias_obj_type_xref();
    }

    /// An alias table has exactly one foreign key, a simple primary key,
    /// and nothing else but timestamps. Tables whose compound key starts
    /// with a foreign key `f` also accept the `f-alias` table's names.
    fn init_alias_obj_type_xref(&mut self) {
        self.alias_xref.clear();
        self.alias_types.clear();

        for (obj_type, info) in &self.types {
            let pk = info.pk.as_deref();
            let foreign_keys: Vec<&str> = info
                .fields
                .iter()
                .filter(|(_, f)| f.kind == FieldKind::ForeignKey)
                .map(|(n, _)| n.as_str())
                .collect();
            let other_fields = info.fields.iter().any(|(name, f)| {
                if f.kind == FieldKind::ForeignKey {
                    return false;
                }
                if Some(name.as_str()) == pk {
                    return f.compound.is_some();
                }
                f.kind != FieldKind::DateTime
            });

            if let ([fk], false) = (foreign_keys.as_slice(), other_fields) {
                if let Some(target) = info.fields[*fk].rel_obj_type.clone() {
                    debug!("alias obj-type {obj_type} for {target}");
                    self.alias_xref
                        .entry(target)
                        .or_default()
                        .push(obj_type.clone());
                    self.alias_types.push(obj_type.clone());
                }
                continue;
            }

            if foreign_keys.is_empty() {
                continue;
            }
            let first = pk
                .and_then(|pk| info.fields.get(pk))
                .and_then(|f| f.compound.as_ref())
                .and_then(|parts| parts.first());
            if let Some(first) = first {
                let candidate = format!("{first}-alias");
                if foreign_keys.contains(&first.as_str()) && self.types.contains_key(&candidate) {
                    self.alias_xref
                        .entry(obj_type.clone())
                        .or_default()
                        .push(candidate);
                }
            }
        }
    }
}

impl ModelRegistry for Catalog {
    fn obj_type_info(&self, obj_type: &str) -> Option<&ObjTypeInfo> {
        self.types.get(obj_type)
    }

    fn obj_type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    fn alias_obj_type_xref(&self, obj_type: &str) -> &[String] {
        self.alias_xref.get(obj_type).map_or(&[][..], Vec::as_slice)
    }

    fn is_alias_obj_type(&self, obj_type: &str) -> bool {
        self.alias_types.iter().any(|t| t == obj_type)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.pk("switch-config"), Some("dpid"));
        assert_eq!(catalog.obj_type_url("host"), Some("device"));
        assert!(catalog.obj_type_has_field("flow-entry", "idle-timeout"));
    }

    #[test]
    fn alias_tables_are_cross_referenced() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.alias_obj_type_xref("switch-config"), ["switch-alias"]);
        assert_eq!(catalog.alias_obj_type_xref("host-config"), ["host-alias"]);
        assert_eq!(catalog.alias_obj_type_xref("controller-node"), ["controller-alias"]);
        assert!(catalog.is_alias_obj_type("host-alias"));
        assert!(!catalog.is_alias_obj_type("flow-entry"));
        assert!(catalog.alias_obj_type_xref("tenant").is_empty());
    }

    #[test]
    fn compound_keys_led_by_a_foreign_key_borrow_its_alias() {
        let catalog = Catalog::builtin().unwrap();
        assert!(
            catalog
                .alias_obj_type_xref("switch-interface-config")
                .contains(&"switch-alias".to_owned())
        );
        assert_eq!(
            catalog.alias_obj_type_xref("host-security-ip-address"),
            ["host-alias"]
        );
    }

    #[test]
    fn merge_adds_fields() {
        let mut catalog = Catalog::builtin().unwrap();
        let extra: IndexMap<String, ObjTypeInfo> = toml::from_str(
            r#"
            [switch-config.fields.description]
            null = true
            "#,
        )
        .unwrap();
        catalog.merge(extra);
        assert!(catalog.is_null_allowed("switch-config", "description"));
        assert_eq!(catalog.pk("switch-config"), Some("dpid"));
    }

    #[test]
    fn malformed_catalog_is_a_config_error() {
        let err = Catalog::from_toml("[x]\npk = 3").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
