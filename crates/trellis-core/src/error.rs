// ── Core error types ──
//
// Errors surfaced by models, controllers, and views. Request failures
// from trellis-api are translated by the `From` impl below so consumers
// deal in one error type; the rejection payload and status survive the
// translation.

use serde_json::Value;
use thiserror::Error;

use crate::validate::ValidationFailure;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Definition errors ────────────────────────────────────────────
    #[error("Invalid definition for {owner}: {message}")]
    Definition { owner: String, message: String },

    #[error("Controller '{controller}' is misconfigured: {message}")]
    Configuration { controller: String, message: String },

    #[error("Controller '{controller}' has no view")]
    NoView { controller: String },

    #[error("Cannot resolve property path '{path}'")]
    UnresolvedPath { path: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Validation failed: {}", summarize(.failures))]
    Validation { failures: Vec<ValidationFailure> },

    // ── Request errors (translated from trellis-api) ─────────────────
    #[error("Request rejected (HTTP {status})")]
    Rejected { payload: Value, status: u16 },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

impl CoreError {
    /// True for mistakes in model, controller, or route declarations.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Self::Definition { .. } | Self::Configuration { .. } | Self::NoView { .. }
        )
    }

    /// The transformed failure body of a rejected request.
    pub fn rejection_payload(&self) -> Option<&Value> {
        match self {
            Self::Rejected { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

fn summarize(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Conversion from request-layer errors ─────────────────────────────

impl From<trellis_api::Error> for CoreError {
    fn from(err: trellis_api::Error) -> Self {
        use trellis_api::Error as ApiError;

        match err {
            ApiError::RequestFailed { payload, status } => CoreError::Rejected { payload, status },
            ApiError::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            ApiError::Transport(ref e) if e.is_connect() => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<unknown>".into()),
                reason: e.to_string(),
            },
            ApiError::Tls(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            ApiError::HttpStatus { status, body } => CoreError::Api {
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {body}")
                },
                status: Some(status),
            },
            ref e if e.is_definition() => CoreError::Definition {
                owner: "resource".into(),
                message: e.to_string(),
            },
            other => CoreError::Api {
                message: other.to_string(),
                status: other.status(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejected_requests_keep_their_payload() {
        let err: CoreError = trellis_api::Error::RequestFailed {
            payload: json!({ "error": "nope" }),
            status: 422,
        }
        .into();

        assert!(matches!(err, CoreError::Rejected { status: 422, .. }));
        assert_eq!(err.rejection_payload(), Some(&json!({ "error": "nope" })));
    }

    #[test]
    fn route_mistakes_become_definition_errors() {
        let err: CoreError = trellis_api::Error::UnknownMethod {
            name: "requestNothing".into(),
        }
        .into();

        assert!(err.is_definition());
        assert!(err.to_string().contains("requestNothing"));
    }

    #[test]
    fn validation_message_lists_every_failure() {
        let err = CoreError::Validation {
            failures: vec![
                ValidationFailure::new("title", "is required"),
                ValidationFailure::new("slug", "must match ^[a-z-]+$"),
            ],
        };

        assert_eq!(
            err.to_string(),
            "Validation failed: title: is required; slug: must match ^[a-z-]+$"
        );
    }
}
