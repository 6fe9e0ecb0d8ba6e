// Per-session transport settings for the store client
//
// Fixed for the life of a session: how the reqwest client trusts https
// controllers and how long it waits, how often a failed GET is retried,
// and how long a cached reply stays fresh.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Certificate, ClientBuilder};

use crate::cache::{UrlCache, DEFAULT_MAX_AGE};
use crate::error::Error;

const USER_AGENT: &str = concat!("sdnsh/", env!("CARGO_PKG_VERSION"));

// ── TLS trust ────────────────────────────────────────────────────────

/// Which certificates an https controller may present.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    #[default]
    System,
    /// PEM bundle trusted in addition to the system roots.
    CustomCa(PathBuf),
    /// Self-signed controllers.
    DangerAcceptInvalid,
}

impl TlsMode {
    fn configure(&self, builder: ClientBuilder) -> Result<ClientBuilder, Error> {
        Ok(match self {
            Self::System => builder,
            Self::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            Self::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        })
    }
}

fn load_ca(path: &Path) -> Result<Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {e}", path.display())))?;
    Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))
}

// ── Retry ────────────────────────────────────────────────────────────

/// Bounded retry of raw GETs after transient failures. Writes are never
/// retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Fail on the first error.
    pub const NONE: Self = Self {
        attempts: 0,
        delay: Duration::from_secs(1),
    };

    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::NONE
        }
    }

    /// Whether a GET that has already been retried `retried` times may
    /// go again after `err`.
    pub fn allows(&self, retried: u32, err: &Error) -> bool {
        retried < self.attempts && err.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

// ── Transport ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout for every exchange.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Lifetime of a URL cache entry.
    pub cache_age: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::NONE,
            cache_age: DEFAULT_MAX_AGE,
        }
    }
}

impl TransportConfig {
    pub fn http_client(&self) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);
        self.tls
            .configure(builder)?
            .build()
            .map_err(|e| Error::Tls(format!("cannot build HTTP client: {e}")))
    }

    /// An empty read cache with this transport's entry lifetime.
    pub fn url_cache(&self) -> UrlCache {
        UrlCache::new(self.cache_age)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::error::RestErrorInfo;

    use super::*;

    #[test]
    fn unreadable_ca_bundle_is_a_tls_error() {
        let transport = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        let err = transport.http_client().unwrap_err();
        assert!(matches!(err, Error::Tls(msg) if msg.contains("cannot read CA bundle")));
    }

    #[test]
    fn retry_only_covers_transient_failures() {
        let down = Error::Rest(RestErrorInfo::Connection("down".into()));
        let missing = Error::Rest(RestErrorInfo::NotFound("gone".into()));

        assert!(!RetryPolicy::NONE.allows(0, &down));

        let policy = RetryPolicy::attempts(2);
        assert!(policy.allows(0, &down));
        assert!(policy.allows(1, &down));
        assert!(!policy.allows(2, &down));
        assert!(!policy.allows(0, &missing));
    }

    #[test]
    fn defaults_match_the_store_cache() {
        let transport = TransportConfig::default();
        assert_eq!(transport.cache_age, DEFAULT_MAX_AGE);
        assert_eq!(transport.retry, RetryPolicy::NONE);
        assert!(transport.http_client().is_ok());
    }
}
