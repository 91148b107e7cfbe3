// ── Core error types ──
//
// User-facing errors from meshly-core. These are NOT transport-specific --
// consumers never see link-layer failures directly. The
// `From<meshly_api::Error>` impl translates transport errors into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport errors ─────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport { message: String },

    // ── Validation errors ────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Session is not running")]
    SessionClosed,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<meshly_api::Error> for CoreError {
    fn from(err: meshly_api::Error) -> Self {
        match err {
            meshly_api::Error::PayloadTooLarge { size, max } => CoreError::ValidationFailed {
                message: format!("payload of {size} bytes exceeds the {max} byte packet limit"),
            },
            meshly_api::Error::SendFailed { .. }
            | meshly_api::Error::Disconnected
            | meshly_api::Error::Encode(_) => CoreError::Transport {
                message: err.to_string(),
            },
        }
    }
}
