//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use trellis_config::ConfigError;
use trellis_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Config ───────────────────────────────────────────────────────
    #[error("Model '{name}' is not defined")]
    #[diagnostic(
        code(trellis::unknown_model),
        help("Configured models: {available}\nSee: trellis config show")
    )]
    UnknownModel { name: String, available: String },

    #[error("Model '{model}' has no method '{method}'")]
    #[diagnostic(
        code(trellis::unknown_method),
        help("List the generated methods with: trellis routes {model}")
    )]
    UnknownMethod { model: String, method: String },

    #[error("Invalid definition: {message}")]
    #[diagnostic(
        code(trellis::definition),
        help("Check the model's routes and parsers in the config file.")
    )]
    Definition { message: String },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(trellis::validation))]
    Validation { field: String, reason: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(trellis::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Failed to load config: {message}")]
    #[diagnostic(code(trellis::config))]
    Config { message: String },

    // ── Requests ─────────────────────────────────────────────────────
    #[error("Request rejected (HTTP {status})")]
    #[diagnostic(code(trellis::rejected), help("Server response: {payload}"))]
    Rejected { status: u16, payload: String },

    #[error("API error: {message}")]
    #[diagnostic(code(trellis::api))]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(trellis::connection_failed),
        help(
            "Check that the server is running and the origin is correct.\n\
             Reason: {reason}\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(trellis::timeout),
        help("Raise the limit with --timeout <MS> or the model's timeout_ms.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Local ────────────────────────────────────────────────────────
    #[error("Failed to render output: {message}")]
    #[diagnostic(code(trellis::output))]
    Output { message: String },

    #[error(transparent)]
    #[diagnostic(code(trellis::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownModel { .. } | Self::UnknownMethod { .. } => exit_code::NOT_FOUND,
            Self::Api {
                status: Some(404), ..
            } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Rejected { payload, status } => Self::Rejected {
                status,
                payload: serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string()),
            },
            CoreError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Api { message, status } => Self::Api { message, status },
            CoreError::Validation { .. } => Self::Validation {
                field: "input".into(),
                reason: err.to_string(),
            },
            other => Self::Definition {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownModel { name } => Self::UnknownModel {
                name,
                available: "(none)".into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Definition { model, source } => Self::Definition {
                message: format!("model '{model}': {source}"),
            },
            ConfigError::InheritanceCycle { .. } => Self::Definition {
                message: err.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
