//! CLI configuration: thin wrapper around `sdnsh_config`.
//!
//! Turns `GlobalOpts` into flag overrides and builds the `Session` every
//! controller-bound command runs against.

use std::sync::Arc;

use sdnsh_config::Overrides;
use sdnsh_core::{Catalog, Session, SessionConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use sdnsh_config::{Profile, config_path, load_config, load_config_or_default, save_config};

/// Flag values that win over the config file and environment.
pub fn overrides(global: &GlobalOpts) -> Overrides {
    Overrides {
        controller: global.controller.clone(),
        timeout: global.timeout,
        insecure: global.insecure,
        netvirt: global.netvirt,
        debug: global.debug,
    }
}

/// Resolve the session settings from config file, env and flags.
///
/// A missing config file means defaults; an unreadable one is an error.
pub fn session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = load_config()?;
    let session = cfg.session_config(global.profile.as_deref(), &overrides(global))?;
    tracing::debug!(
        controller = session.controller.as_deref().unwrap_or("<none>"),
        timeout = session.timeout.as_secs(),
        "resolved session config"
    );
    Ok(session)
}

/// Build a session over the built-in object catalog.
pub fn open_session(global: &GlobalOpts) -> Result<Session, CliError> {
    let config = session_config(global)?;
    let catalog = Catalog::builtin()?;
    Ok(Session::new(config, Arc::new(catalog))?)
}

/// Build a session that must have a controller to talk to.
pub fn connected_session(global: &GlobalOpts) -> Result<Session, CliError> {
    let session = open_session(global)?;
    if session.config().controller.is_none() {
        return Err(CliError::NoController);
    }
    Ok(session)
}
