use thiserror::Error;

/// Top-level error type for the `meshly-api` crate.
///
/// Covers the transport surface only: delivery failures and link
/// state. `meshly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Delivery ────────────────────────────────────────────────────
    /// The transport could not hand the packet to the radio.
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    /// Outbound payload exceeds what one mesh packet can carry.
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Link ────────────────────────────────────────────────────────
    /// The link to the local radio is down.
    #[error("Radio link disconnected")]
    Disconnected,

    // ── Data ────────────────────────────────────────────────────────
    /// Payload encoding failed before transmission.
    #[error("Encode error: {0}")]
    Encode(String),
}

impl Error {
    /// Returns `true` if retrying the send later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SendFailed { .. } | Self::Disconnected)
    }
}
