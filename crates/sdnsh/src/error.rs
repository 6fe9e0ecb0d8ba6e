//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use sdnsh_api::RestErrorInfo;
use sdnsh_config::ConfigError;
use sdnsh_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("No controller specified. Set using 'controller <server:port>'.")]
    #[diagnostic(
        code(sdnsh::no_controller),
        help(
            "Pass --controller <host:port>, set SDNSH_CONTROLLER,\n\
             or create a profile with: sdnsh config init --controller <host:port>"
        )
    )]
    NoController,

    #[error("{message}")]
    #[diagnostic(
        code(sdnsh::connection_failed),
        help("Check that the controller is running and its REST port is reachable.")
    )]
    Connection { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(sdnsh::timeout),
        help("Increase timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(sdnsh::not_found))]
    NotFound { message: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(sdnsh::invalid_argument), help("{help}"))]
    Validation { message: String, help: String },

    #[error("{0}")]
    #[diagnostic(code(sdnsh::usage))]
    Usage(String),

    // ── Controller replies ───────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(sdnsh::rest_error))]
    Rest(String),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sdnsh::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: sdnsh config init --name {name} --controller <host:port>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("{0}")]
    #[diagnostic(code(sdnsh::config))]
    Config(String),

    // ── Everything else ──────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(sdnsh::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoController
            | Self::Validation { .. }
            | Self::Usage(_)
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Connection { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoController => CliError::NoController,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Rest(info) => rest_error(info),

            CoreError::Api(e) => match e {
                sdnsh_api::Error::Transport(_) | sdnsh_api::Error::Tls(_) => CliError::Connection {
                    message: e.to_string(),
                },
                sdnsh_api::Error::Rest(info) => rest_error(info),
                sdnsh_api::Error::UnsupportedScheme(_) | sdnsh_api::Error::InvalidBlobId { .. } => {
                    CliError::Usage(e.to_string())
                }
                other => CliError::Internal(other.to_string()),
            },

            CoreError::ArgumentValidation {
                ref expected, ..
            } => {
                let help = if expected.is_empty() {
                    "Check the value and try again.".to_owned()
                } else {
                    format!("Expected one of: {}", expected.join(", "))
                };
                CliError::Validation {
                    message: err.to_string(),
                    help,
                }
            }

            CoreError::DataHandler(_) => CliError::Validation {
                message: err.to_string(),
                help: "Check the related arguments for consistency.".into(),
            },

            CoreError::NotFound { .. } => CliError::NotFound {
                message: err.to_string(),
            },

            CoreError::Usage(message) => CliError::Usage(message),

            CoreError::Config { message } => CliError::Config(message),

            CoreError::Description(_) | CoreError::Internal(_) => {
                CliError::Internal(err.to_string())
            }
        }
    }
}

fn rest_error(info: RestErrorInfo) -> CliError {
    match info {
        RestErrorInfo::NotFound(message) => CliError::NotFound { message },
        RestErrorInfo::Connection(message) => CliError::Connection { message },
        other => CliError::Rest(other.to_string()),
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::Validation { .. } => CliError::Validation {
                message: err.to_string(),
                help: "Use host:port or an http(s):// URL.".into(),
            },
            other => CliError::Config(other.to_string()),
        }
    }
}
