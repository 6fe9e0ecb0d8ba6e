// ── Completion engine ──
//
// Each completion procedure fills a `Completions` set for a partial token.
// Keys are the candidate text (a trailing space marks a finished word) and
// values are the reason shown in two-column help.

mod config;
mod interface;
mod staticflow;

use std::str::FromStr;

use indexmap::IndexMap;
use indexmap::map::Iter;
use sdnsh_api::{Lookup, Row};
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::session::Session;
use crate::util::{
    add_delim, completion_trailing_integer_cmp, field_text, pretty, quote_string, value_text,
};

pub use config::description_versions;
pub use staticflow::complete_staticflow_actions;

/// Delimiter closing a completed word.
pub const DELIM: &str = " ";

// ── Completion set ───────────────────────────────────────────────────

/// Candidate text → reason. Empty candidates are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completions(IndexMap<String, String>);

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text: impl Into<String>, reason: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.0.insert(text, reason.into());
    }

    /// Insert every candidate with the same reason.
    pub fn extend_with_reason<I, S>(&mut self, items: I, reason: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self.insert(item, reason);
        }
    }

    /// Is `value` present, with or without the closing delimiter?
    pub fn contains(&self, value: &str) -> bool {
        self.0.contains_key(value) || self.0.contains_key(&format!("{value}{DELIM}"))
    }

    pub fn get(&self, text: &str) -> Option<&str> {
        self.0.get(text).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.0.iter()
    }

    /// Candidates ordered for display, numeric suffixes numerically.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut items: Vec<(&str, &str)> =
            self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        items.sort_by(|a, b| completion_trailing_integer_cmp(a.0, b.0));
        items
    }
}

impl<'a> IntoIterator for &'a Completions {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Request parameters ───────────────────────────────────────────────

/// Another obj-type supplying candidates, optionally naming its field.
/// Written `obj-type` or `obj-type|field` in command descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtherSpec {
    Type(String),
    TypeField { obj_type: String, field: String },
}

impl OtherSpec {
    pub fn obj_type(&self) -> &str {
        match self {
            Self::Type(obj_type) | Self::TypeField { obj_type, .. } => obj_type,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Type(_) => None,
            Self::TypeField { field, .. } => Some(field),
        }
    }
}

impl FromStr for OtherSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('|') {
            None if !s.is_empty() => Ok(Self::Type(s.to_owned())),
            Some((obj_type, field))
                if !obj_type.is_empty() && !field.is_empty() && !field.contains('|') =>
            {
                Ok(Self::TypeField {
                    obj_type: obj_type.to_owned(),
                    field: field.to_owned(),
                })
            }
            _ => Err(CoreError::Description(format!("bad other specification: {s:?}"))),
        }
    }
}

/// How a completion narrows to the object being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    Unscoped,
    /// The submode object supplies the key components.
    ModeObject,
    /// A sibling argument supplies the key components.
    DataField(String),
}

/// The named parameters a completion hook receives.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub obj_type: String,
    pub field: String,
    /// Partial token being completed.
    pub text: String,
    /// Sibling argument values already parsed.
    pub data: Row,
    pub other: Option<OtherSpec>,
    pub scope: Scope,
    /// Field of `obj_type` referring to the submode object.
    pub parent_field: Option<String>,
    /// Id of the submode object.
    pub mode_obj_id: Option<String>,
    pub is_no_command: bool,
    /// Search only by the scoping data field.
    pub explicit: bool,
}

impl CompletionRequest {
    pub fn new(obj_type: &str, field: &str, text: &str) -> Self {
        Self {
            obj_type: obj_type.to_owned(),
            field: field.to_owned(),
            text: text.to_owned(),
            data: Row::new(),
            other: None,
            scope: Scope::Unscoped,
            parent_field: None,
            mode_obj_id: None,
            is_no_command: false,
            explicit: false,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Row) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_other(mut self, other: OtherSpec) -> Self {
        self.other = Some(other);
        self
    }

    #[must_use]
    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Run inside a submode whose object is `obj_id`.
    #[must_use]
    pub fn in_mode(mut self, obj_id: &str, parent_field: Option<&str>) -> Self {
        self.mode_obj_id = Some(obj_id.to_owned());
        self.parent_field = parent_field.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn no_command(mut self, is_no_command: bool) -> Self {
        self.is_no_command = is_no_command;
        self
    }

    #[must_use]
    pub fn explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    /// `data` plus the parent reference and the prefix filter on `field`.
    fn search_data(&self, field: &str) -> Row {
        let mut data = self.data.clone();
        if let (Some(parent_field), Some(parent_id)) = (&self.parent_field, &self.mode_obj_id) {
            data.insert(parent_field.clone(), Value::String(parent_id.clone()));
        }
        if !self.text.is_empty() {
            data.insert(format!("{field}__startswith"), Value::String(self.text.clone()));
        }
        data
    }
}

/// `ns|name|value` tag keys read back as `ns.name=value`.
fn render_tag(value: &str) -> String {
    let parts: Vec<&str> = value.split('|').collect();
    match parts.as_slice() {
        [namespace, name, value] => format!("{namespace}.{name}={value}"),
        _ => value.to_owned(),
    }
}

/// Scalar or list field values as text, skipping empties.
fn field_values(row: &Row, field: &str) -> Vec<String> {
    match row.get(field) {
        Some(Value::Array(items)) => items.iter().map(value_text).filter(|v| !v.is_empty()).collect(),
        Some(Value::Bool(false) | Value::Null) | None => Vec::new(),
        Some(value) => Some(value_text(value)).filter(|v| !v.is_empty()).into_iter().collect(),
    }
}

impl Session {
    fn require_obj_type(&self, obj_type: &str) -> Result<(), CoreError> {
        if self.registry().obj_type_exists(obj_type) {
            Ok(())
        } else {
            Err(CoreError::Description(format!("Unknown obj-type: {obj_type}")))
        }
    }

    /// The alias table whose names may stand in for the completed values.
    fn completion_alias_obj_type(&self, req: &CompletionRequest) -> Option<String> {
        let mi = self.registry();
        let obj_type = req.obj_type.as_str();
        let field = req.field.as_str();
        if let Some(first) = req
            .other
            .as_ref()
            .and_then(|other| mi.alias_obj_type_xref(other.obj_type()).first())
        {
            return Some(first.clone());
        }
        if mi.pk(obj_type) != Some(field) {
            if !mi.is_foreign_key(obj_type, field) {
                debug!("collect_object_fields: no alias for {obj_type} field {field}, not pk or fk");
                return None;
            }
            let (target, _) = mi.foreign_key_references(obj_type, field)?;
            let config = mi.obj_type_related_config_obj_type(target)?;
            return mi.alias_obj_type_xref(config).first().cloned();
        }
        mi.alias_obj_type_xref(obj_type).first().cloned()
    }

    /// Candidate values of `req.field` for `req.obj_type`, delimited,
    /// with aliases replacing the keys they name.
    #[allow(clippy::too_many_lines)]
    async fn collect_object_fields(
        &self,
        req: &CompletionRequest,
        prefix: &str,
        completions: &Completions,
    ) -> Result<Vec<String>, CoreError> {
        let mi = self.registry();
        let obj_type = req.obj_type.as_str();
        let field = req.field.as_str();

        let mut data = req.data.clone();
        if let (Some(parent_field), Some(parent_id)) = (&req.parent_field, &req.mode_obj_id) {
            data.insert(parent_field.clone(), Value::String(parent_id.clone()));
        }
        if !prefix.is_empty() {
            data.insert(format!("{field}__startswith"), Value::String(prefix.to_owned()));
        }

        let key = mi
            .pk(obj_type)
            .ok_or_else(|| CoreError::Description(format!("{obj_type}: no primary key")))?;
        if req.scope != Scope::Unscoped {
            let obj_id = req.mode_obj_id.clone().unwrap_or_default();
            if mi.is_alias_obj_type(obj_type) {
                if let Some(fk) = mi.alias_obj_type_field(obj_type) {
                    data.insert(fk.to_owned(), Value::String(obj_id));
                }
            } else {
                let mut obj_d = Row::new();
                obj_d.insert(key.to_owned(), Value::String(obj_id));
                mi.split_compound_into_dict(obj_type, key, &mut obj_d, true);
                for (k, v) in obj_d {
                    if k != key && !data.contains_key(&k) {
                        data.insert(k, v);
                    }
                }
            }
        }

        let alias_obj_type = self.completion_alias_obj_type(req);
        let mut alias_dict = IndexMap::new();
        let mut alias_key = "";
        if let Some(alias) = alias_obj_type.as_deref() {
            if let (Some(fk), Some(pk)) = (mi.alias_obj_type_field(alias), mi.pk(alias)) {
                alias_dict = self.create_obj_type_dict(alias, fk, None).await;
                alias_key = pk;
            }
        }

        data.retain(|_, v| !v.is_null());
        let rows = self.rest_query(obj_type, &data).await?;
        debug!("collect_object_fields: {obj_type} {field} {} rows", rows.len());

        let is_compound = mi.is_compound_key(obj_type, key);
        let mut found: Vec<String> = Vec::new();
        let mut add = |value: String| {
            let quoted = quote_string(&value);
            if !completions.contains(&quoted) && !found.contains(&quoted) {
                found.push(quoted);
            }
        };
        for mut row in rows {
            if is_compound {
                mi.split_compound_into_dict(obj_type, key, &mut row, false);
            }
            for mut value in field_values(&row, field) {
                if obj_type == "tag" && field == "id" {
                    value = render_tag(&value);
                }
                if let Some(alias) = alias_dict
                    .get(&value)
                    .and_then(|rows| rows.first())
                    .map(|r| field_text(r, alias_key))
                    .filter(|a| a.starts_with(prefix))
                {
                    value = alias;
                }
                add(value);
            }
        }

        // The prefix may name an alias rather than a key, so matching
        // aliases are offered directly.
        if alias_obj_type.is_some() && !prefix.is_empty() {
            for rows in alias_dict.values() {
                for row in rows {
                    let alias = field_text(row, alias_key);
                    if alias.starts_with(prefix) {
                        add(alias);
                    }
                }
            }
        }

        Ok(add_delim(found, DELIM))
    }

    // ── complete-object-field ────────────────────────────────────────

    /// Values of `field` (usually the primary key) for `obj_type`.
    pub async fn complete_object_field(
        &self,
        req: &CompletionRequest,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        debug!("complete_object_field: {} {} {:?}", req.obj_type, req.field, req.scope);
        self.require_obj_type(&req.obj_type)?;
        let result = self.collect_object_fields(req, &req.text, completions).await?;
        completions.extend_with_reason(result, &format!("{} selection", pretty(&req.obj_type)));
        Ok(())
    }

    // ── complete-tag-mapping ─────────────────────────────────────────

    /// Tag keys rendered as `namespace.name=value`. The prefix could
    /// apply to any of the three parts, so it is matched after rendering.
    pub async fn complete_tag_mapping(
        &self,
        req: &CompletionRequest,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        self.require_obj_type(&req.obj_type)?;
        let collection = self.collect_object_fields(req, "", completions).await?;
        completions.extend_with_reason(
            collection.into_iter().filter(|c| c.starts_with(req.text.as_str())),
            "tag selection",
        );
        Ok(())
    }

    // ── complete-from-another ────────────────────────────────────────

    /// Candidates drawn from `req.other` rather than the type whose field
    /// is being completed. No-commands only name existing values, so they
    /// get nothing here.
    #[allow(clippy::too_many_lines)]
    pub async fn complete_from_another(
        &self,
        req: &CompletionRequest,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        if req.is_no_command {
            return Ok(());
        }
        let Some(other_spec) = req.other.as_ref() else {
            return Err(CoreError::Description(
                "complete-from-another without an other obj-type".to_owned(),
            ));
        };
        let mi = self.registry();
        let other = other_spec.obj_type();
        let mut field = other_spec.field().unwrap_or(&req.field).to_owned();
        if !mi.obj_type_exists(other) {
            return Err(CoreError::Description(format!("Unknown obj-type/other: {other}")));
        }
        debug!("complete_from_another: {other} {field} {:?}", req.scope);

        let prefix = req.text.as_str();
        let reason = format!("{} selection", pretty(other));
        let mut data = req.search_data(&field);
        let key = mi
            .pk(other)
            .ok_or_else(|| CoreError::Description(format!("{other}: no primary key")))?;

        let mut obj_d = Row::new();
        if req.scope != Scope::Unscoped {
            let scope_value = match &req.scope {
                Scope::DataField(name) => req.data.get(name).cloned(),
                _ => None,
            };
            let scope_value = scope_value
                .unwrap_or_else(|| Value::String(req.mode_obj_id.clone().unwrap_or_default()));
            obj_d.insert(key.to_owned(), scope_value);
            mi.split_compound_into_dict(other, key, &mut obj_d, true);
            for (k, v) in &obj_d {
                if k != key && !data.contains_key(k) {
                    data.insert(k.clone(), v.clone());
                }
            }
        }

        let rows = if mi.is_primitive_compound_key(other, key) {
            // Assemble the key from the named components, in order, and
            // prefix-complete the first one missing.
            let separator = mi.compound_key_separator(other, key).unwrap_or('|');
            let mut value = String::new();
            let mut missing = None;
            for component in mi.deep_compound_key_fields(other, key) {
                match data.get(&component) {
                    Some(v) => {
                        value.push_str(&value_text(v));
                        value.push(separator);
                    }
                    None => {
                        missing = Some(component);
                        break;
                    }
                }
            }
            let mut post_prefix_match = !prefix.is_empty();
            if post_prefix_match && missing.as_deref() == Some(field.as_str()) {
                value.push_str(prefix);
                post_prefix_match = false;
            }
            let rows = if mi.obj_type_has_model(other) {
                self.store()
                    .get_table_from_store(other, Some((key, value.as_str())), Lookup::StartsWith)
                    .await?
            } else {
                // Native endpoints filter on their own fields, not the key.
                let mut search = Row::new();
                if !value.is_empty() {
                    search.insert(format!("{key}__startswith"), Value::String(value.clone()));
                }
                self.get_model_from_url(other, &search)
                    .await?
                    .into_iter()
                    .filter(|r| field_text(r, key).starts_with(&value))
                    .collect()
            };
            if post_prefix_match {
                rows.into_iter()
                    .filter(|r| r.get(&field).is_some_and(|v| value_text(v).starts_with(prefix)))
                    .collect()
            } else {
                rows
            }
        } else if mi.is_compound_key(other, key) {
            let deep = mi.deep_compound_key_fields(other, key);
            let mut search = Row::new();
            if let Some(parent_id) = req.mode_obj_id.as_deref() {
                if let Some(from_pk) = mi.pk(&req.obj_type) {
                    let mut from_id = Row::new();
                    from_id.insert(from_pk.to_owned(), Value::String(parent_id.to_owned()));
                    mi.split_compound_into_dict(&req.obj_type, from_pk, &mut from_id, true);
                    for deep_field in &deep {
                        if let Some(v) = data.get(deep_field).or_else(|| from_id.get(deep_field)) {
                            search.insert(deep_field.clone(), v.clone());
                        }
                    }
                }
            }
            for deep_field in &deep {
                if let Some(v) = obj_d.get(deep_field) {
                    search.insert(deep_field.clone(), v.clone());
                }
            }
            if req.explicit {
                search.clear();
                if let Scope::DataField(name) = &req.scope {
                    if let Some(v) = req.data.get(name) {
                        search.insert(name.clone(), v.clone());
                    }
                }
            }
            if !prefix.is_empty() {
                search.insert(format!("{field}__startswith"), Value::String(prefix.to_owned()));
            }
            self.rest_query(other, &search).await?
        } else if mi.obj_type_has_field(other, &field) && mi.is_primary_key(other, &field) {
            let result = self.objects_starting_with(other, prefix, None).await;
            completions.extend_with_reason(add_delim(result, DELIM), &reason);
            return Ok(());
        } else if mi.obj_type_has_field(&req.obj_type, &field) && mi.is_foreign_key(&req.obj_type, &field) {
            let Some((fk_obj_type, fk_field)) = mi.foreign_key_references(&req.obj_type, &field) else {
                return Ok(());
            };
            let rows = self
                .store()
                .get_table_from_store(fk_obj_type, Some((fk_field, prefix)), Lookup::StartsWith)
                .await?;
            field = fk_field.to_owned();
            rows
        } else if mi.obj_type_has_field(&req.obj_type, &field) && field == other {
            let result = self.objects_starting_with(other, prefix, None).await;
            completions.extend_with_reason(add_delim(result, DELIM), &reason);
            return Ok(());
        } else {
            self.rest_query(other, &data).await?
        };

        debug!("complete_from_another: {other} {field} {} rows", rows.len());
        let mut found: Vec<String> = Vec::new();
        for row in &rows {
            for mut value in field_values(row, &field) {
                if other == "tag" {
                    value = render_tag(&value);
                }
                let quoted = quote_string(&value);
                if !completions.contains(&quoted) && !found.contains(&quoted) {
                    found.push(quoted);
                }
            }
        }
        completions.extend_with_reason(add_delim(found, DELIM), &reason);
        Ok(())
    }

    // ── complete-alias-choice ────────────────────────────────────────

    /// Keys or aliases of an unrelated obj-type, optionally redirected to
    /// `req.other`.
    pub async fn complete_alias_choice(
        &self,
        req: &CompletionRequest,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        self.require_obj_type(&req.obj_type)?;
        let mi = self.registry();
        let (obj_type, field) = match req.other.as_ref().filter(|_| !req.is_no_command) {
            Some(other) => (other.obj_type(), other.field().unwrap_or(&req.field)),
            None => (req.obj_type.as_str(), req.field.as_str()),
        };
        if !mi.obj_type_has_field(obj_type, field) {
            return Err(CoreError::Description(format!(
                "Unknown field {field} for obj-type: {obj_type}"
            )));
        }
        let result = self.objects_starting_with(obj_type, &req.text, Some(field)).await;
        completions.extend_with_reason(
            add_delim(result, DELIM),
            &format!("{} alias selection", pretty(obj_type)),
        );
        Ok(())
    }
}
