// ── Pretty-print formatter ──
//
// Declarative display formats keyed by name (usually an obj-type). A
// format lists named column orderings and per-field display metadata.
// Formats from several sources merge field by field, so a later source
// can refine a column without restating the rest.

mod formatters;
mod graph;

pub use formatters::{FormatContext, Formatter, time_since};
pub use graph::{GraphSize, line_graph};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sdnsh_api::Row;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::alias::{AliasCache, AliasFamilies};
use crate::error::CoreError;
use crate::model::ModelRegistry;
use crate::session::Session;
use crate::util::value_text;

const BUILTIN_FORMATS: &str = include_str!("formats.toml");

/// Column name of the synthesized 1-based row index.
pub const IDX: &str = "Idx";

// ── Descriptors ──────────────────────────────────────────────────────

/// Display metadata for one field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FieldFormat {
    pub verbose_name: Option<String>,
    pub formatter: Option<Formatter>,
    /// Used instead of `formatter` in the detail view.
    pub entry_formatter: Option<Formatter>,
    /// Row field naming the switch for port decoding.
    pub switch_key: Option<String>,
    pub help_text: Option<String>,
    pub units: Option<String>,
    /// Alias caches rendering this field reads. Extended with the
    /// formatters' own needs when the format is registered.
    pub aliases: AliasFamilies,
}

impl FieldFormat {
    fn merge(&mut self, other: Self) {
        if other.verbose_name.is_some() {
            self.verbose_name = other.verbose_name;
        }
        if other.formatter.is_some() {
            self.formatter = other.formatter;
        }
        if other.entry_formatter.is_some() {
            self.entry_formatter = other.entry_formatter;
        }
        if other.switch_key.is_some() {
            self.switch_key = other.switch_key;
        }
        if other.help_text.is_some() {
            self.help_text = other.help_text;
        }
        if other.units.is_some() {
            self.units = other.units;
        }
        self.aliases.extend(other.aliases);
        for f in self.formatter.iter().chain(self.entry_formatter.iter()) {
            self.aliases.extend(f.alias_families());
        }
    }

    /// Compound-key helper fields stay out of detail views.
    pub fn is_hidden(&self) -> bool {
        self.help_text.as_deref().is_some_and(|h| h.starts_with('#'))
    }
}

/// A format as supplied by one source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FormatDescriptor {
    pub field_orderings: IndexMap<String, Vec<String>>,
    pub fields: IndexMap<String, FieldFormat>,
}

/// A registered format: every source's descriptors merged.
#[derive(Debug, Clone, Default)]
pub struct Format {
    /// Name of the first source that defined this format.
    pub source: String,
    pub origin: String,
    pub field_orderings: IndexMap<String, Vec<String>>,
    pub fields: IndexMap<String, FieldFormat>,
}

impl Format {
    fn header(&self, field: &str) -> String {
        self.fields
            .get(field)
            .and_then(|f| f.verbose_name.clone())
            .unwrap_or_else(|| capitalize(field))
    }

    /// Columns of view `ordering`; every field when the view is missing.
    fn columns(&self, ordering: &str) -> Vec<String> {
        match self.field_orderings.get(ordering) {
            Some(columns) if !columns.is_empty() => columns.clone(),
            _ => self.fields.keys().cloned().collect(),
        }
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Format>,
}

impl FormatRegistry {
    /// The formats shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        if let Err(e) = registry.add_formats_from_toml("BUILTIN", "formats.toml", BUILTIN_FORMATS) {
            error!("built-in formats: {e}");
        }
        registry
    }

    /// Add a format per obj-type from the model's verbose names. Compound
    /// key components marked internal are hidden from detail views. Fields
    /// already described keep their description.
    #[must_use]
    pub fn with_model(mut self, registry: &dyn ModelRegistry) -> Self {
        let descriptors = registry
            .obj_type_names()
            .into_iter()
            .filter_map(|obj_type| {
                let info = registry.obj_type_info(obj_type)?;
                let known = self.formats.get(obj_type);
                let fields = info
                    .fields
                    .iter()
                    .filter(|(name, _)| known.is_none_or(|f| !f.fields.contains_key(*name)))
                    .map(|(name, field)| {
                        let format = FieldFormat {
                            verbose_name: field.verbose_name.clone(),
                            help_text: field.internal.then(|| "#compound key component".to_owned()),
                            ..FieldFormat::default()
                        };
                        (name.clone(), format)
                    })
                    .collect();
                Some((obj_type.to_owned(), FormatDescriptor {
                    field_orderings: IndexMap::new(),
                    fields,
                }))
            })
            .collect();
        self.add_format("MODEL", "model_info", descriptors);
        self
    }

    /// Merge `descriptors` into the registry. `name` and `origin` identify
    /// the source for diagnostics; the first source to define a format
    /// keeps its attribution.
    pub fn add_format(&mut self, name: &str, origin: &str, descriptors: IndexMap<String, FormatDescriptor>) {
        for (format_name, descriptor) in descriptors {
            let format = self
                .formats
                .entry(format_name)
                .or_insert_with(|| Format {
                    source: name.to_owned(),
                    origin: origin.to_owned(),
                    ..Format::default()
                });
            for (field, field_format) in descriptor.fields {
                format.fields.entry(field).or_default().merge(field_format);
            }
            format.field_orderings.extend(descriptor.field_orderings);
            format.fields.entry(IDX.to_owned()).or_insert_with(|| FieldFormat {
                verbose_name: Some("#".to_owned()),
                ..FieldFormat::default()
            });
        }
    }

    /// Parse TOML descriptors and merge them.
    pub fn add_formats_from_toml(&mut self, name: &str, origin: &str, text: &str) -> Result<(), CoreError> {
        let descriptors: IndexMap<String, FormatDescriptor> = toml::from_str(text)
            .map_err(|e| CoreError::Description(format!("format source {name}: {e}")))?;
        self.add_format(name, origin, descriptors);
        Ok(())
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }

    pub fn get(&self, format: &str) -> Option<&Format> {
        self.formats.get(format)
    }

    /// One row per format, ready for [`FormatRegistry::format_table`].
    pub fn format_details(&self) -> Vec<Row> {
        self.formats
            .iter()
            .map(|(name, format)| {
                Row::from_iter([
                    ("format".to_owned(), Value::String(name.clone())),
                    ("format dict".to_owned(), Value::String(format.source.clone())),
                    ("origin".to_owned(), Value::String(format.origin.clone())),
                ])
            })
            .collect()
    }

    /// Alias caches to refresh before rendering `format`.
    pub fn format_to_alias_update(&self, format: &str) -> AliasFamilies {
        self.formats
            .get(format)
            .map(|f| {
                f.fields
                    .values()
                    .flat_map(|field| field.aliases.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Fixed-width table of `rows`, one column per field of view
    /// `ordering`. Without a known format every key present is shown,
    /// sorted. Rows lacking `Idx` are numbered from 1.
    pub fn format_table(&self, rows: &[Row], format: Option<&str>, ordering: &str, aliases: &AliasCache) -> String {
        if let Some(message) = error_message(rows) {
            return message;
        }
        if rows.is_empty() {
            return "None.".into();
        }
        let info = format.and_then(|f| self.formats.get(f));
        debug!(
            "format_table: {} {} entries",
            format.unwrap_or("<none>"),
            rows.len()
        );

        let (columns, headers): (Vec<String>, Vec<String>) = match info {
            Some(info) => info
                .columns(ordering)
                .into_iter()
                .map(|c| {
                    let header = info.header(&c);
                    (c, header)
                })
                .unzip(),
            None => {
                let mut keys: Vec<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
                keys.sort();
                keys.dedup();
                let headers = keys.iter().map(|k| capitalize(k)).collect();
                (keys, headers)
            }
        };

        let now = Utc::now();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut row = row.clone();
                row.entry(IDX.to_owned()).or_insert_with(|| Value::from(i + 1));
                columns
                    .iter()
                    .map(|column| render_cell(info, column, &row, false, aliases, now))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain([header.chars().count()])
                    .max()
                    .unwrap_or_default()
            })
            .collect();

        let line = |values: &[String]| {
            let mut text = values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{v:<w$}"))
                .collect::<Vec<_>>()
                .join(" ");
            text.push('\n');
            text
        };

        let mut out = line(&headers);
        out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("|"));
        out.push('\n');
        for row in &cells {
            out.push_str(&line(row));
        }
        out
    }

    /// `label : value` lines for one row: the fields of view `ordering`
    /// first, then the rest of the format's fields. Hidden fields appear
    /// only when `debug` is set.
    pub fn format_entry(
        &self,
        row: &Row,
        format: Option<&str>,
        ordering: &str,
        debug: bool,
        aliases: &AliasCache,
    ) -> String {
        if let Some(message) = error_message(std::slice::from_ref(row)) {
            return message;
        }
        if row.is_empty() {
            return "None.".into();
        }
        let info = format.and_then(|f| self.formats.get(f));
        let mut fields: Vec<String> = match info {
            Some(info) => {
                let mut fields = info.columns(ordering);
                let rest: Vec<String> = info
                    .fields
                    .keys()
                    .filter(|f| !fields.contains(f))
                    .cloned()
                    .collect();
                fields.extend(rest);
                fields
            }
            None => {
                debug!("format_entry: missing format {}", format.unwrap_or("<none>"));
                let mut keys: Vec<String> = row.keys().cloned().collect();
                keys.sort();
                keys
            }
        };

        let header = |field: &str| info.map_or_else(|| capitalize(field), |i| i.header(field));
        let label_width = row
            .keys()
            .map(|k| k.chars().count())
            .chain(fields.iter().map(|f| header(f).chars().count()))
            .max()
            .unwrap_or_default();

        let now = Utc::now();
        fields.retain(|field| {
            let field_format = info.and_then(|i| i.fields.get(field));
            let formatted = field_format.is_some_and(|f| f.formatter.is_some() || f.entry_formatter.is_some());
            let hidden = !debug && field_format.is_some_and(FieldFormat::is_hidden);
            (row.contains_key(field) || formatted) && !hidden
        });
        fields
            .iter()
            .map(|field| {
                let value = render_cell(info, field, row, true, aliases, now);
                format!("{:<label_width$} : {value}", header(field))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Line graph of `(epoch_ms, value)` points using the `value` field of
    /// `format` for the axis label and units.
    pub fn format_time_series_graph(&self, points: &[(i64, f64)], format: Option<&str>, size: GraphSize) -> String {
        let value = format
            .and_then(|f| self.formats.get(f))
            .and_then(|f| f.fields.get("value"));
        let label = value
            .and_then(|v| v.verbose_name.as_deref())
            .unwrap_or("Value");
        let units = value.and_then(|v| v.units.as_deref());
        line_graph(points, label, units, size)
    }
}

/// The message of an error-shaped result.
fn error_message(rows: &[Row]) -> Option<String> {
    match rows {
        [row] if row.contains_key("error_type") => Some(
            row.get("description")
                .map(value_text)
                .unwrap_or_else(|| "Internal error".into()),
        ),
        _ => None,
    }
}

fn render_cell(
    info: Option<&Format>,
    column: &str,
    row: &Row,
    entry: bool,
    aliases: &AliasCache,
    now: DateTime<Utc>,
) -> String {
    let empty = Value::String(String::new());
    let value = row.get(column).unwrap_or(&empty);
    let Some(field) = info.and_then(|i| i.fields.get(column)) else {
        return value_text(value);
    };
    let formatter = if entry {
        field.entry_formatter.or(field.formatter)
    } else {
        field.formatter
    };
    match formatter {
        Some(formatter) => {
            let ctx = FormatContext {
                aliases,
                switch_key: field.switch_key.as_deref(),
                now,
            };
            formatter.render(value, row, &ctx)
        }
        None => value_text(value),
    }
}

// ── Session rendering ────────────────────────────────────────────────

impl Session {
    /// Refresh the alias caches `format` reads, then render `rows`.
    pub async fn format_table(&self, rows: &[Row], format: &str, ordering: &str) -> String {
        self.obj_type_show_alias_update(format).await;
        self.formats()
            .format_table(rows, Some(format), ordering, self.aliases())
    }

    /// Refresh the alias caches `format` reads, then render one row.
    pub async fn format_entry(&self, row: &Row, format: &str, ordering: &str) -> String {
        self.obj_type_show_alias_update(format).await;
        self.formats()
            .format_entry(row, Some(format), ordering, self.config().debug, self.aliases())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::alias::AliasFamily;
    use crate::model::Catalog;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn builtin_formats_parse() {
        let mut registry = FormatRegistry::default();
        registry
            .add_formats_from_toml("BUILTIN", "formats.toml", BUILTIN_FORMATS)
            .unwrap();
        assert!(registry.get("switches").is_some());
        assert!(registry.get("host").unwrap().fields["id"].is_hidden());
    }

    #[test]
    fn table_without_format_uses_sorted_keys() {
        let registry = FormatRegistry::default();
        let table = registry.format_table(
            &rows(json!([{"b": "x", "a": 1}, {"a": 22, "b": "yy"}])),
            None,
            "default",
            &AliasCache::default(),
        );
        assert_eq!(table, "A  B \n--|--\n1  x \n22 yy\n");
    }

    #[test]
    fn table_widths_follow_formatted_cells() {
        let aliases = AliasCache::default();
        aliases.replace(
            AliasFamily::Switch,
            HashMap::from([("00:00:00:00:00:00:00:01".to_owned(), "core1".to_owned())]),
        );
        let registry = FormatRegistry::builtin();
        let table = registry.format_table(
            &rows(json!([{"dpid": "00:00:00:00:00:00:00:01", "core-switch": true}])),
            Some("switch-config"),
            "default",
            &aliases,
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# Switch DPID"));
        assert!(lines[2].starts_with("1 00:00:00:00:00:00:00:01 (core1) True"));
        assert!(lines[1].starts_with("-|-------------------------------|"));
    }

    #[test]
    fn error_results_short_circuit() {
        let registry = FormatRegistry::builtin();
        let aliases = AliasCache::default();
        let err = rows(json!([{"error_type": "x", "description": "bad thing"}]));
        assert_eq!(registry.format_table(&err, Some("host"), "default", &aliases), "bad thing");
        assert_eq!(registry.format_entry(&err[0], Some("host"), "default", false, &aliases), "bad thing");
        assert_eq!(registry.format_table(&[], Some("host"), "default", &aliases), "None.");
    }

    #[test]
    fn entry_hides_compound_key_parts() {
        let registry = FormatRegistry::builtin();
        let aliases = AliasCache::default();
        let row = rows(json!([{
            "id": "default|10|00:00:00:00:00:01",
            "mac": "00:00:00:00:00:01",
            "vlan": 10,
        }]))
        .remove(0);
        let entry = registry.format_entry(&row, Some("host"), "brief", false, &aliases);
        let labels: Vec<&str> = entry.lines().map(|l| l.split(" : ").next().unwrap().trim()).collect();
        assert_eq!(labels[0], "MAC Address");
        assert!(labels.contains(&"VLAN"));
        assert!(!labels.contains(&"Id"));
        let debug = registry.format_entry(&row, Some("host"), "brief", true, &aliases);
        assert!(debug.lines().any(|l| l.starts_with("Id ")));
    }

    #[test]
    fn merge_is_additive() {
        let mut registry = FormatRegistry::builtin();
        registry
            .add_formats_from_toml(
                "EXTRA",
                "test",
                "[switches.fields.dpid]\nverbose-name = \"DPID\"\n[switches.fields.extra]\nverbose-name = \"Extra\"\n",
            )
            .unwrap();
        let switches = registry.get("switches").unwrap();
        assert_eq!(switches.source, "BUILTIN");
        assert_eq!(switches.fields["dpid"].verbose_name.as_deref(), Some("DPID"));
        assert_eq!(switches.fields["dpid"].formatter, Some(Formatter::SwitchAndAlias));
        assert!(switches.fields.contains_key("extra"));
        assert!(switches.field_orderings.contains_key("brief"));
    }

    #[test]
    fn alias_update_comes_from_field_tags() {
        let registry = FormatRegistry::builtin();
        let families = registry.format_to_alias_update("host");
        assert!(families.contains(&AliasFamily::Host));
        assert!(families.contains(&AliasFamily::Port));
        assert!(registry.format_to_alias_update("static-arp").is_empty());
        assert!(registry.format_to_alias_update("nonexistent").is_empty());
    }

    #[test]
    fn model_formats_cover_every_obj_type() {
        let catalog = Catalog::builtin().unwrap();
        let registry = FormatRegistry::builtin().with_model(&catalog);
        assert!(registry.formats().any(|f| f == "tag-mapping"));
        let details = registry.format_details();
        let switches = details.iter().find(|r| r["format"] == json!("switches")).unwrap();
        assert_eq!(switches["format dict"], json!("BUILTIN"));
    }
}
