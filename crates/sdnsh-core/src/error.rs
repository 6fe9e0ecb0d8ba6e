// ── Core error types ──
//
// User-facing errors from sdnsh-core. Transport failures arrive as
// `sdnsh_api::Error` and are translated by the `From` impl below, so the
// command layer only ever matches on `CoreError`.

use sdnsh_api::RestErrorInfo;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("No controller specified. Set using 'controller <server:port>'.")]
    NoController,

    #[error("Request to controller timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Error dictionary reported by the REST API, already classified.
    #[error("{0}")]
    Rest(RestErrorInfo),

    /// Any other transport-layer failure.
    #[error(transparent)]
    Api(sdnsh_api::Error),

    // ── Command description defects ──────────────────────────────────
    /// A completion, validation or data-handler registration names an
    /// obj-type or field the model does not know.
    #[error("Bad command description: {0}")]
    Description(String),

    // ── Argument errors ──────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    ArgumentValidation {
        value: String,
        message: String,
        /// Candidate values to offer when the input was ambiguous.
        expected: Vec<String>,
    },

    /// Cross-field inconsistency found while deriving extra argument data.
    #[error("Invalid argument: {0}")]
    DataHandler(String),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("No such {kind} \"{id}\"")]
    NotFound { kind: String, id: String },

    #[error("{0}")]
    Usage(String),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for an argument validation failure.
    pub fn invalid(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArgumentValidation {
            value: value.into(),
            message: message.into(),
            expected: Vec::new(),
        }
    }

    /// The REST error dictionary behind this error, if any.
    pub fn rest_info(&self) -> Option<&RestErrorInfo> {
        match self {
            Self::Rest(info) => Some(info),
            Self::Api(e) => e.rest_info(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Rest(RestErrorInfo::NotFound(_)) => true,
            Self::Api(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sdnsh_api::Error> for CoreError {
    fn from(err: sdnsh_api::Error) -> Self {
        match err {
            sdnsh_api::Error::NoController => CoreError::NoController,
            sdnsh_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            sdnsh_api::Error::Rest(info) => CoreError::Rest(info),
            sdnsh_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sdnsh_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rest_errors_keep_their_message() {
        let err: CoreError =
            sdnsh_api::Error::Rest(RestErrorInfo::NotFound("Not Found: switch-config x".into()))
                .into();
        assert!(err.is_not_found());
        assert!(err.rest_info().is_some());
    }

    #[test]
    fn missing_controller_is_a_usage_message() {
        let err: CoreError = sdnsh_api::Error::NoController.into();
        assert_eq!(
            err.to_string(),
            "No controller specified. Set using 'controller <server:port>'."
        );
    }

    #[test]
    fn argument_errors_render_with_prefix() {
        let err = CoreError::invalid("10.0.0.0/33", "max cidr block is 32");
        assert_eq!(err.to_string(), "Invalid argument: max cidr block is 32");
    }
}
