// ── Runtime session configuration ──
//
// Describes how a `Session` talks to the controller and which shell-wide
// settings the core consults. Core never reads config files: the CLI
// builds a `SessionConfig` (normally through sdnsh-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use sdnsh_api::{RetryPolicy, TlsMode, TransportConfig};

/// Words the shell reserves; they are never converted through alias
/// tables and are rejected as identifiers.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &["all", "localhost", "running-config"];

/// Everything a `Session` needs besides the model registry.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `host:port` or a full `http(s)://` base URL. `None` leaves the
    /// session unbound; every REST call then fails with `NoController`.
    pub controller: Option<String>,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Lifetime of a URL cache entry.
    pub cache_age: Duration,
    /// Append every cached REST reply to this file.
    pub record_urls: Option<PathBuf>,
    /// Extra attempts for transient transport failures on raw GETs.
    pub retry_count: u32,
    pub reserved_words: Vec<String>,
    /// Overrides the controller's `feature` table for gating tenant/vns
    /// running-config sections.
    pub netvirt: Option<bool>,
    /// Show compound-key helper fields in detail views.
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            controller: None,
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            cache_age: Duration::from_secs(2),
            record_urls: None,
            retry_count: 0,
            reserved_words: DEFAULT_RESERVED_WORDS
                .iter()
                .map(|w| (*w).to_owned())
                .collect(),
            netvirt: None,
            debug: false,
        }
    }
}

impl SessionConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            retry: RetryPolicy::attempts(self.retry_count),
            cache_age: self.cache_age,
        }
    }

    pub fn is_reserved_word(&self, word: &str) -> bool {
        self.reserved_words.iter().any(|w| w == word)
    }
}
