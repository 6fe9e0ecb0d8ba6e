// ── Running-config synthesizer ──
//
// Rebuilds the command text that would recreate the controller's stored
// configuration. Each section renders one subsystem; the unscoped dump
// runs every enabled section in priority order under a version banner.
// A field is emitted only when it differs from its declared default.

mod host;
mod node;
mod switch;
mod vns;

use chrono::Local;
use sdnsh_api::{Lookup, Row};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::complete::{Completions, DELIM, OtherSpec};
use crate::error::CoreError;
use crate::session::Session;
use crate::util::{field_text, quote_string, value_text};

/// Sections left out of the unscoped dump because another section
/// already renders their content.
const UNSCOPED_EXCLUDED: &[Section] = &[Section::Vns];

/// One running-config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Section {
    Feature,
    ControllerNode,
    Switch,
    Host,
    StaticArp,
    Tenant,
    Vns,
}

impl Section {
    /// Position in the unscoped dump; lower renders first.
    pub fn order(self) -> u32 {
        match self {
            Self::Feature => 1000,
            Self::ControllerNode => 2000,
            Self::Switch => 3000,
            Self::Host => 5000,
            Self::StaticArp => 6000,
            Self::Tenant | Self::Vns => 7000,
        }
    }

    /// Only shown while network virtualization is enabled.
    pub fn netvirt_gated(self) -> bool {
        matches!(self, Self::Tenant | Self::Vns)
    }

    pub fn short_help(self) -> &'static str {
        match self {
            Self::Feature => "Configuration for enabled/disabled features",
            Self::ControllerNode => "Configuration for controller nodes",
            Self::Switch => "Configuration for switches",
            Self::Host => "Configuration for hosts",
            Self::StaticArp => "Configuration for static ARP entry",
            Self::Tenant => "Configuration for Tenant",
            Self::Vns => "Configuration for network virtualization",
        }
    }

    /// Where candidates for the optional object id come from.
    pub fn id_source(self) -> Option<OtherSpec> {
        let (obj_type, field) = match self {
            Self::ControllerNode => ("controller-node", "id"),
            Self::Switch => ("switch-config", "dpid"),
            Self::Host => ("host-config", "mac"),
            Self::Tenant => ("tenant", "name"),
            Self::Vns => ("vns-definition", "vnsname"),
            Self::Feature | Self::StaticArp => return None,
        };
        Some(OtherSpec::TypeField {
            obj_type: obj_type.to_owned(),
            field: field.to_owned(),
        })
    }
}

// ── Text helpers ─────────────────────────────────────────────────────

/// Two spaces per submode level.
pub(crate) fn indent(level: usize) -> String {
    "  ".repeat(level)
}

fn pick_section(word: &str, enabled: &[Section]) -> Result<Section, CoreError> {
    if let Some(exact) = enabled.iter().find(|s| s.to_string() == word) {
        return Ok(*exact);
    }
    let matches: Vec<Section> = enabled
        .iter()
        .copied()
        .filter(|s| s.to_string().starts_with(word))
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(CoreError::Usage(format!("unknown running-config item: {word}"))),
        many => Err(CoreError::Usage(format!(
            "{} ambiguous",
            many.iter().map(ToString::to_string).collect::<Vec<_>>().join(" and ")
        ))),
    }
}

// ── Session operations ───────────────────────────────────────────────

impl Session {
    /// Sections currently enabled, in dump order.
    pub async fn running_config_sections(&self) -> Vec<Section> {
        let netvirt = self.netvirt_feature_enabled().await;
        let mut sections: Vec<Section> = Section::iter()
            .filter(|s| netvirt || !s.netvirt_gated())
            .collect();
        sections.sort_by_key(|s| s.order());
        sections
    }

    /// `show running-config [<section> [<id>]]`.
    ///
    /// `version` fills the banner of the unscoped dump. The trailing
    /// newline of the last line is dropped.
    pub async fn show_running_config(&self, words: &[&str], version: &str) -> Result<String, CoreError> {
        let enabled = self.running_config_sections().await;
        let mut config = String::new();
        if let Some(word) = words.first() {
            let section = pick_section(word, &enabled)?;
            self.perform_running_config(section, &mut config, words.get(1).copied())
                .await?;
            config.pop();
            return Ok(config);
        }

        for section in enabled.into_iter().filter(|s| !UNSCOPED_EXCLUDED.contains(s)) {
            self.perform_running_config(section, &mut config, None).await?;
        }
        if config.is_empty() {
            return Ok(config);
        }
        let now = Local::now().format("%Y-%m-%d.%H:%M:%S %Z");
        let mut text = format!("!\n! {version}\n! Current Time: {now}\n!\nversion 1.0\n");
        text.push_str(&config);
        text.pop();
        Ok(text)
    }

    async fn perform_running_config(
        &self,
        section: Section,
        config: &mut String,
        id: Option<&str>,
    ) -> Result<(), CoreError> {
        debug!("running-config {section}");
        match section {
            Section::Feature => self.running_config_feature(config).await,
            Section::ControllerNode => self.running_config_controller_node(config, id).await,
            Section::Switch => self.running_config_switch(config, id).await,
            Section::Host => self.running_config_host(config, id).await,
            Section::StaticArp => self.running_config_static_arp(config).await,
            Section::Tenant => self.running_config_tenant(config, id).await,
            Section::Vns => self.running_config_vns(config, id).await,
        }
    }

    /// Section names for `show running-config <text>`.
    pub async fn complete_running_config(&self, text: &str, completions: &mut Completions) {
        for section in self.running_config_sections().await {
            let name = section.to_string();
            if name.starts_with(text) {
                completions.insert(format!("{name}{DELIM}"), section.short_help());
            }
        }
    }

    // ── Shared section helpers ───────────────────────────────────────

    /// All rows of a section's table; `None` when the read fails, which
    /// silently drops the section.
    pub(crate) async fn section_table(&self, obj_type: &str) -> Option<Vec<Row>> {
        match self.store().get_table_from_store(obj_type, None, Lookup::Eq).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                debug!("running-config: {obj_type} unavailable: {e}");
                None
            }
        }
    }

    /// Append `<indent><field> <value>` when `value` is not the default.
    /// String values are quoted the way the tokenizer reads them back.
    pub(crate) fn include_field(
        &self,
        config: &mut String,
        obj_type: &str,
        field: &str,
        value: &Value,
        level: usize,
        prefix: &str,
    ) {
        let mi = self.registry();
        if !mi.not_default_value(obj_type, field, value) {
            return;
        }
        let text = value_text(value);
        let text = if mi.is_integer_field(obj_type, field) || mi.is_field_boolean(obj_type, field) {
            text
        } else {
            quote_string(&text)
        };
        config.push_str(&format!("{}{prefix}{field} {text}\n", indent(level)));
    }

    /// Append `<indent><alias-type> <alias>` for each alias naming `key`.
    pub(crate) async fn include_alias(&self, config: &mut String, level: usize, obj_type: &str, key: &str) {
        let mi = self.registry();
        for alias in mi.alias_obj_type_xref(obj_type) {
            let (Some(field), Some(pk)) = (mi.alias_obj_type_field(alias), mi.pk(alias)) else {
                continue;
            };
            let rows = self
                .store()
                .get_table_from_store(alias, Some((field, key)), Lookup::Exact)
                .await
                .unwrap_or_default();
            match rows.as_slice() {
                [] => {}
                [row] => config.push_str(&format!("{}{alias} {}\n", indent(level), field_text(row, pk))),
                _ => self.warn(format!("{alias} {key}: alias count > 1")),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn section_names() {
        assert_eq!(Section::ControllerNode.to_string(), "controller-node");
        assert_eq!("static-arp".parse::<Section>().unwrap(), Section::StaticArp);
    }

    #[test]
    fn prefixes_pick_unique_sections() {
        let all: Vec<Section> = Section::iter().collect();
        assert_eq!(pick_section("sw", &all).unwrap(), Section::Switch);
        assert_eq!(pick_section("switch", &all).unwrap(), Section::Switch);
        assert_eq!(pick_section("v", &all).unwrap(), Section::Vns);
        let err = pick_section("s", &all).unwrap_err();
        assert_eq!(err.to_string(), "switch and static-arp ambiguous");
        let err = pick_section("bogus", &all).unwrap_err();
        assert_eq!(err.to_string(), "unknown running-config item: bogus");
    }

    #[test]
    fn gated_sections() {
        assert!(Section::Tenant.netvirt_gated());
        assert!(!Section::Host.netvirt_gated());
        assert!(Section::Feature.id_source().is_none());
        assert_eq!(Section::Switch.id_source().unwrap().obj_type(), "switch-config");
    }
}
