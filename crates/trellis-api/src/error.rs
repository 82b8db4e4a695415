use serde_json::Value;
use thiserror::Error;

/// Top-level error type for the `trellis-api` crate.
///
/// Three families share this enum:
///
/// - **Definition errors** are programmer mistakes in a resource
///   definition (bad route key, unknown handler name, missing route
///   parameter). They are never retried or caught internally.
/// - **Request failures** carry the fail-payload transform of a response
///   body that came back but was rejected by the validity check.
/// - **Transport failures** come from the HTTP layer and are passed
///   through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    // ── Definition ──────────────────────────────────────────────────
    /// A `:name` placeholder had no matching key in the call parameters.
    #[error("route '{route}' requires parameter '{param}'")]
    MissingRouteParam { route: String, param: String },

    /// A `:$n` placeholder had no matching positional argument.
    #[error("route '{route}' requires positional argument {index}")]
    MissingRouteArg { route: String, index: usize },

    /// A route or parser key could not be parsed.
    #[error("invalid route '{key}': {reason}")]
    InvalidRoute { key: String, reason: String },

    /// A route value was neither a method name nor an options object.
    #[error("route '{key}' must map to a method name or an options object")]
    InvalidRouteTarget { key: String },

    /// No route generated a method with this name.
    #[error("no route defines method '{name}'")]
    UnknownMethod { name: String },

    /// A parser entry named a handler that is not registered.
    #[error("unknown response handler '{name}'")]
    UnknownHandler { name: String },

    /// A parser path did not compile to a valid pattern.
    #[error("invalid parser pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // ── Request ─────────────────────────────────────────────────────
    /// The server answered, but the body was empty or failed validation.
    /// `payload` is the fail-payload transform of the body.
    #[error("request rejected (HTTP {status})")]
    RequestFailed { payload: Value, status: u16 },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` for errors caused by a faulty resource definition.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Self::MissingRouteParam { .. }
                | Self::MissingRouteArg { .. }
                | Self::InvalidRoute { .. }
                | Self::InvalidRouteTarget { .. }
                | Self::UnknownMethod { .. }
                | Self::UnknownHandler { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The fail payload of a rejected request, if this is one.
    pub fn fail_payload(&self) -> Option<&Value> {
        match self {
            Self::RequestFailed { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
