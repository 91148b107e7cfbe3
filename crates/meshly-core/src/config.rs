// ── Runtime session configuration ──
//
// Describes the radio pairing a session operates against. The
// embedding application constructs a `SessionConfig` and hands it in;
// core never reads config files.

use std::time::Duration;

use meshly_api::NodeId;

/// Configuration for one sync session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Address of the locally attached radio. Channel updates whose
    /// destination is this node also replace the session's own
    /// channel list once all writes are issued.
    pub local_node: NodeId,

    /// Size of the radio's channel table. Pagination never requests
    /// an index at or beyond this bound.
    pub max_channels: u8,

    /// How long an outstanding request may go unanswered before the
    /// session gives up on it. `None` (the default) keeps the source
    /// behavior: an unanswered request stays pending until overwritten
    /// or cleared.
    pub request_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(local_node: NodeId) -> Self {
        Self {
            local_node,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_node: NodeId(0),
            max_channels: 8,
            request_timeout: None,
        }
    }
}
