//! Shared configuration for the sdnsh shell.
//!
//! TOML profiles layered under `SDNSH_` environment variables, and
//! translation to `sdnsh_core::SessionConfig`. The binary adds its
//! flag overrides on top through [`Overrides`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sdnsh_api::TlsMode;
use sdnsh_core::SessionConfig;
use sdnsh_core::config::DEFAULT_RESERVED_WORDS;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    UnknownProfile { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Settings applied when no profile (or a partial one) is active.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// `host:port` or an `http(s)://` base URL.
    pub controller: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_cache_age")]
    pub cache_age_secs: u64,

    /// Append every cached REST reply to this file.
    pub record_urls: Option<PathBuf>,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default = "default_reserved_words")]
    pub reserved_words: Vec<String>,

    /// Force tenant/vns running-config sections on or off.
    pub netvirt: Option<bool>,

    #[serde(default)]
    pub insecure: bool,

    pub ca_cert: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            controller: None,
            timeout: default_timeout(),
            cache_age_secs: default_cache_age(),
            record_urls: None,
            retry_count: 0,
            reserved_words: default_reserved_words(),
            netvirt: None,
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_cache_age() -> u64 {
    2
}
fn default_reserved_words() -> Vec<String> {
    DEFAULT_RESERVED_WORDS.iter().map(|w| (*w).to_owned()).collect()
}

/// A named controller profile. Unset fields fall back to [`Defaults`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    pub controller: String,
    pub timeout: Option<u64>,
    pub cache_age_secs: Option<u64>,
    pub record_urls: Option<PathBuf>,
    pub retry_count: Option<u32>,
    pub netvirt: Option<bool>,
    pub insecure: Option<bool>,
    /// Path to a PEM CA certificate for https controllers.
    pub ca_cert: Option<PathBuf>,
}

/// Command-line values that win over file and environment settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub controller: Option<String>,
    pub timeout: Option<u64>,
    pub insecure: bool,
    pub netvirt: Option<bool>,
    pub debug: bool,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "sdnsh", "sdnsh").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sdnsh");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, then `SDNSH_` variables.
///
/// Nested keys use a double underscore: `SDNSH_DEFAULTS__CONTROLLER`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SDNSH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(cfg)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// The profile name in effect: the explicit one, else `default_profile`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Build the session settings for `profile`, applying `overrides` last.
    ///
    /// An explicitly named profile must exist; the implicit default may be
    /// absent, in which case `[defaults]` alone apply.
    pub fn session_config(
        &self,
        profile: Option<&str>,
        overrides: &Overrides,
    ) -> Result<SessionConfig, ConfigError> {
        let name = self.active_profile_name(profile);
        let selected = match self.profiles.get(&name) {
            Some(p) => Some(p),
            None if profile.is_some() => {
                let mut available: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                return Err(ConfigError::UnknownProfile {
                    name,
                    available: if available.is_empty() {
                        "none".into()
                    } else {
                        available.join(", ")
                    },
                });
            }
            None => None,
        };
        let d = &self.defaults;

        let controller = overrides
            .controller
            .clone()
            .or_else(|| selected.map(|p| p.controller.clone()).filter(|c| !c.is_empty()))
            .or_else(|| d.controller.clone());
        if let Some(c) = &controller {
            validate_controller(c)?;
        }

        let insecure = overrides.insecure || selected.and_then(|p| p.insecure).unwrap_or(d.insecure);
        let ca_cert = selected.and_then(|p| p.ca_cert.clone()).or_else(|| d.ca_cert.clone());
        let tls = if insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(path) = ca_cert {
            TlsMode::CustomCa(path)
        } else {
            TlsMode::System
        };

        let timeout = overrides
            .timeout
            .or_else(|| selected.and_then(|p| p.timeout))
            .unwrap_or(d.timeout);
        if timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least one second".into(),
            });
        }
        let cache_age = selected.and_then(|p| p.cache_age_secs).unwrap_or(d.cache_age_secs);

        Ok(SessionConfig {
            controller,
            tls,
            timeout: Duration::from_secs(timeout),
            cache_age: Duration::from_secs(cache_age),
            record_urls: selected
                .and_then(|p| p.record_urls.clone())
                .or_else(|| d.record_urls.clone()),
            retry_count: selected.and_then(|p| p.retry_count).unwrap_or(d.retry_count),
            reserved_words: d.reserved_words.clone(),
            netvirt: overrides
                .netvirt
                .or_else(|| selected.and_then(|p| p.netvirt))
                .or(d.netvirt),
            debug: overrides.debug,
        })
    }
}

/// Accept `host:port` or an `http(s)://` base URL.
pub fn validate_controller(controller: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: "controller".into(),
        reason,
    };
    let candidate = if controller.contains("://") {
        controller.to_owned()
    } else {
        format!("http://{controller}")
    };
    let url = url::Url::parse(&candidate).map_err(|e| invalid(format!("{controller}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("{controller}: missing host")));
    }
    Ok(())
}
