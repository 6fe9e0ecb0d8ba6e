// ── Session context ──
//
// One `Session` per shell. It owns the store client (and through it the
// URL cache), the alias caches, the format registry, the model registry
// handle and a sink for advisory warnings. Every operation in this crate
// is a method on `&Session`; interior state sits behind std locks that
// are never held across an `.await`.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sdnsh_api::StoreClient;
use serde_json::Value;
use tracing::{debug, warn};

use crate::alias::AliasCache;
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::format::FormatRegistry;
use crate::model::ModelRegistry;

/// Shell-wide runtime context.
#[derive(Debug)]
pub struct Session {
    store: StoreClient,
    registry: Arc<dyn ModelRegistry>,
    config: SessionConfig,
    aliases: AliasCache,
    formats: RwLock<FormatRegistry>,
    warnings: Mutex<Vec<String>>,
}

impl Session {
    /// Build a session and its store client from `config`.
    pub fn new(config: SessionConfig, registry: Arc<dyn ModelRegistry>) -> Result<Self, CoreError> {
        let store = StoreClient::new(config.controller.clone(), &config.transport())?;
        if let Some(path) = config.record_urls.as_deref() {
            store.cache().record(Some(path)).map_err(|e| CoreError::Config {
                message: format!("cannot record REST replies to {}: {e}", path.display()),
            })?;
        }
        Ok(Self::with_store(store, registry, config))
    }

    /// Wrap an existing store client.
    pub fn with_store(
        store: StoreClient,
        registry: Arc<dyn ModelRegistry>,
        config: SessionConfig,
    ) -> Self {
        let formats = FormatRegistry::builtin().with_model(registry.as_ref());
        Self {
            store,
            registry,
            config,
            aliases: AliasCache::default(),
            formats: RwLock::new(formats),
            warnings: Mutex::new(Vec::new()),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn registry(&self) -> &dyn ModelRegistry {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasCache {
        &self.aliases
    }

    pub fn formats(&self) -> RwLockReadGuard<'_, FormatRegistry> {
        self.formats.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn formats_mut(&self) -> RwLockWriteGuard<'_, FormatRegistry> {
        self.formats.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the session at another controller. Cached replies and alias
    /// tables belong to the old controller and are dropped.
    pub fn set_controller(&self, controller: Option<String>) {
        self.store.set_controller(controller);
        self.aliases.clear();
    }

    pub fn is_reserved_word(&self, word: &str) -> bool {
        self.config.is_reserved_word(word)
    }

    // ── Warnings ─────────────────────────────────────────────────────

    /// Record an advisory message for the front end to print.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Drain the pending warnings.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    // ── Feature gates ────────────────────────────────────────────────

    /// Whether network virtualization (tenants, vns) is enabled.
    ///
    /// The configured override wins; otherwise the controller's `feature`
    /// table decides, falling back to its declared default. An unreadable
    /// table reads as disabled.
    pub async fn netvirt_feature_enabled(&self) -> bool {
        if let Some(enabled) = self.config.netvirt {
            return enabled;
        }
        let field = "netvirt-feature";
        match self
            .store
            .get_table_from_store("feature", None, sdnsh_api::Lookup::Eq)
            .await
        {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get(field))
                .or_else(|| self.registry.field_default_value("feature", field))
                .is_some_and(|v| match v {
                    Value::Bool(b) => *b,
                    Value::String(s) => s.eq_ignore_ascii_case("true"),
                    _ => false,
                }),
            Err(e) => {
                debug!("feature table unavailable: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Catalog;

    fn session(config: SessionConfig) -> Session {
        Session::new(config, Arc::new(Catalog::builtin().unwrap())).unwrap()
    }

    #[test]
    fn warnings_drain() {
        let s = session(SessionConfig::default());
        s.warn("switch 00:01 duplicate interface names: eth1");
        assert_eq!(s.take_warnings().len(), 1);
        assert!(s.take_warnings().is_empty());
    }

    #[tokio::test]
    async fn netvirt_override_skips_the_store() {
        let s = session(SessionConfig {
            netvirt: Some(true),
            ..SessionConfig::default()
        });
        assert!(s.netvirt_feature_enabled().await);
    }

    #[tokio::test]
    async fn netvirt_without_controller_is_disabled() {
        let s = session(SessionConfig::default());
        assert!(!s.netvirt_feature_enabled().await);
    }

    #[test]
    fn reserved_words_come_from_config() {
        let s = session(SessionConfig::default());
        assert!(s.is_reserved_word("all"));
        assert!(!s.is_reserved_word("sw1"));
    }
}
