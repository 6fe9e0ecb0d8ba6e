use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Top-level error type for the `sdnsh-api` crate.
///
/// Transport failures, REST error dictionaries and blob-id problems all land
/// here. `sdnsh-core` wraps these into its own `CoreError`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// No controller address has been configured for this session.
    #[error("No controller specified. Set using 'controller <server:port>'.")]
    NoController,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Only http and https destinations can be written to or read from.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    // ── REST store ──────────────────────────────────────────────────
    /// Error dictionary returned by (or synthesized for) the REST API.
    #[error("{0}")]
    Rest(RestErrorInfo),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A user-data identifier did not follow `name/timestamp=../version=../length=..`.
    #[error("Invalid user data id '{id}': {reason}")]
    InvalidBlobId { id: String, reason: String },

    /// Another writer stored the same user-data version first.
    #[error("Version {version} of '{name}' was written concurrently")]
    VersionConflict { name: String, version: u32 },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Rest(info) => matches!(info, RestErrorInfo::Connection(_)),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Rest(info) => matches!(info, RestErrorInfo::NotFound(_)),
            _ => false,
        }
    }

    /// The error dictionary, if this came from the REST layer.
    pub fn rest_info(&self) -> Option<&RestErrorInfo> {
        match self {
            Self::Rest(info) => Some(info),
            _ => None,
        }
    }
}

// ── REST error dictionary ───────────────────────────────────────────

/// Typed view of the controller's error dictionaries.
///
/// The REST server reports failures as a JSON object keyed by the error
/// family (`field_errors`, `model_error`, ...). HTTP-level failures are
/// folded into the same shape at the store boundary, so every REST error
/// reaches the user through the single `Display` impl below.
#[derive(Debug, Clone, PartialEq)]
pub enum RestErrorInfo {
    /// Per-field validation failures.
    FieldErrors(IndexMap<String, String>),
    /// Whole-object validation failure.
    ModelError(String),
    /// HTTP 404.
    NotFound(String),
    /// The server could not be reached or its backing store is down.
    Connection(String),
    /// A 400 reply whose body was not a JSON dictionary.
    ErrorResult(String),
    /// Any other HTTP failure.
    Unknown(String),
    /// `{"error_type": .., "description": ..}` replies.
    Typed {
        controller: String,
        error_type: String,
        description: String,
    },
}

impl RestErrorInfo {
    /// Interpret a JSON reply as an error dictionary.
    ///
    /// Returns `None` for values that are not error-shaped (lists, objects
    /// without any recognized key).
    pub fn from_value(controller: &str, value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| obj.get(key).map(value_text);

        if let Some(Value::Object(fields)) = obj.get("field_errors") {
            let map = fields
                .iter()
                .map(|(k, v)| (k.clone(), value_text(v)))
                .collect();
            return Some(Self::FieldErrors(map));
        }
        if let Some(msg) = text("model_error") {
            return Some(Self::ModelError(msg));
        }
        if let Some(msg) = text("not_found_error") {
            return Some(Self::NotFound(msg));
        }
        if let Some(msg) = text("connection_error") {
            return Some(Self::Connection(msg));
        }
        if let Some(msg) = text("error_result_error") {
            return Some(Self::ErrorResult(msg));
        }
        if let Some(msg) = text("unknown_error") {
            return Some(Self::Unknown(msg));
        }
        let error_type = text("error_type")?;
        Some(Self::Typed {
            controller: controller.to_owned(),
            error_type,
            description: text("description").unwrap_or_default(),
        })
    }

    /// Map a non-success HTTP status and its body into the taxonomy.
    ///
    /// `detail` replaces the body text in not-found messages when the
    /// caller knows what it was looking for.
    pub fn from_status(controller: &str, status: u16, body: &str, detail: Option<&str>) -> Self {
        let first_line = body.lines().next().unwrap_or_default();
        match status {
            404 => Self::NotFound(format!("Not Found: {}", detail.unwrap_or(first_line))),
            500 | 403 => Self::Connection(format!(
                "REST API server {controller} unable to connect: Cassandra possibly not running"
            )),
            400 => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| Self::from_value(controller, &v))
                .unwrap_or_else(|| {
                    Self::ErrorResult(format!("Can't convert returned error: {first_line}"))
                }),
            _ => Self::Unknown(format!("HttpError {first_line}")),
        }
    }

    /// Short family name, matching the dictionary key the server uses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FieldErrors(_) => "field_errors",
            Self::ModelError(_) => "model_error",
            Self::NotFound(_) => "not_found_error",
            Self::Connection(_) => "connection_error",
            Self::ErrorResult(_) => "error_result_error",
            Self::Unknown(_) => "unknown_error",
            Self::Typed { .. } => "error_type",
        }
    }
}

impl std::fmt::Display for RestErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldErrors(fields) => {
                for (field, msg) in fields {
                    write!(f, "Syntax error: field {field}: {msg}")?;
                }
                Ok(())
            }
            Self::ModelError(msg) | Self::NotFound(msg) => write!(f, "Error: {msg}"),
            Self::Connection(msg) | Self::ErrorResult(msg) | Self::Unknown(msg) => f.write_str(msg),
            Self::Typed {
                controller,
                error_type,
                description,
            } => write!(
                f,
                "REST API server on controller-node {controller} had {error_type} error:\n{description}"
            ),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
