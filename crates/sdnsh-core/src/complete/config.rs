// Saved-configuration, description-version and log-name completions

use std::path::Path;

use sdnsh_api::{Row, VersionSelector};
use serde::Deserialize;
use tracing::debug;

use super::Completions;
use crate::alias::log_url;
use crate::error::CoreError;
use crate::session::Session;
use crate::util::field_text;

/// URI schemes a copy command accepts besides saved configurations.
const COPY_SCHEMES: [&str; 5] = ["http://", "file://", "ftp://", "tftp://", "config://"];

#[derive(Debug, Deserialize)]
struct LogName {
    log: String,
}

impl Session {
    /// Saved configurations as `config://<name>`. For `copy`, also
    /// `running-config` and the URI schemes. Whichever destination is
    /// already bound as the source is left out.
    pub async fn complete_config(
        &self,
        prefix: &str,
        data: &Row,
        copy: bool,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        let configs = self
            .store()
            .get_user_data_table(None, VersionSelector::Latest)
            .await?;

        let source = field_text(data, "source");
        let role = if source.is_empty() { "source" } else { "destination" };

        if copy && "running-config".starts_with(prefix) && source != "running-config" {
            completions.insert("running-config ", format!("running-config {role}"));
        }

        for config in &configs {
            let uri = format!("config://{}", config.name());
            if uri.starts_with(prefix) && source != uri {
                completions.insert(format!("{uri} "), format!("Saved Configuration {role}"));
            }
        }

        if !source.is_empty() && "config://".starts_with(prefix) {
            completions.insert("config://", format!("config prefix {role}"));
        }

        if copy {
            for scheme in COPY_SCHEMES.iter().filter(|s| s.starts_with(prefix)) {
                completions.insert(*scheme, format!("other {role}"));
            }
        }
        Ok(())
    }

    /// Log names reported by each reachable controller.
    pub async fn complete_log_names(
        &self,
        prefix: &str,
        data: &Row,
        completions: &mut Completions,
    ) -> Result<(), CoreError> {
        let controller = data.get("controller").and_then(|v| v.as_str());
        for ip_port in self.controller_ip_and_port(controller).await? {
            let url = log_url(&ip_port, None);
            let names: Vec<LogName> = match self.store().rest_json_request(&url).await {
                Ok(reply) => serde_json::from_value(reply).unwrap_or_default(),
                Err(e) => {
                    debug!("complete_log_names: {url}: {e}");
                    continue;
                }
            };
            for name in names.into_iter().filter(|n| n.log.starts_with(prefix)) {
                completions.insert(format!("{} ", name.log), "Log Selection");
            }
        }
        Ok(())
    }
}

/// Command-description versions found in `dir`.
///
/// `versionNNN` entries read as `N.NN` (`version200` is `2.0`, which also
/// implies `1.0`); other entries are offered by name.
pub fn description_versions(
    dir: &Path,
    prefix: &str,
    completions: &mut Completions,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let element = entry?.file_name().to_string_lossy().into_owned();
        if element == "__init__.py" {
            continue;
        }
        let Some(number) = element.strip_prefix("version") else {
            if element.starts_with(prefix) {
                completions.insert(element, "VERSION");
            }
            continue;
        };
        let Ok(number) = number.parse::<u32>() else {
            debug!("description_versions: skipping {element}");
            continue;
        };
        let version = if number % 100 == 0 {
            format!("{}.0", number / 100)
        } else {
            format!("{}.{:02}", number / 100, number % 100)
        };
        if version.starts_with(prefix) {
            completions.insert(version.clone(), "VERSION");
        }
        if version == "2.0" && "1.0".starts_with(prefix) {
            completions.insert("1.0", "VERSION");
        }
    }
    Ok(())
}
