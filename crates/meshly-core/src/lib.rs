//! Configuration sync engine between `meshly-api` and UI consumers.
//!
//! This crate owns the correlated request/response machinery for
//! talking to a remote radio node over a single-flight packet
//! transport:
//!
//! - **[`RadioSession`]** -- Central facade managing the full
//!   lifecycle: [`start()`](RadioSession::start) subscribes to the
//!   packet stream and spawns the session worker; commands are routed
//!   through an `mpsc` channel and resolve when dispatched.
//!
//! - **Sync engine** (internal) -- The single-slot correlation table
//!   plus the admin-protocol interpreter. At most one correlated
//!   request is outstanding at a time; a later dispatch silently
//!   orphans an unanswered one. Matched responses are interpreted one
//!   at a time and may chain a follow-up request (channel pagination,
//!   module-config pivots).
//!
//! - **[`ConfigSyncState`]** -- The aggregated observable outcome:
//!   accumulated channel table, per-section config snapshots, and the
//!   [`ResponseState`] machine. Watch it through
//!   [`StateStream`](stream::StateStream).
//!
//! - **[`diff_channels`]** -- Minimal channel-table diff: one write per
//!   changed slot, with positional role assignment.
//!
//! - **[`NodeDirectory`]** -- Display names for traceroute rendering.

pub mod command;
pub mod config;
pub mod diff;
pub mod error;
pub mod nodes;
pub mod session;
pub mod state;
pub mod stream;

mod engine;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::SessionConfig;
pub use diff::{ChannelUpdate, diff_channels};
pub use error::CoreError;
pub use nodes::NodeDirectory;
pub use session::RadioSession;
pub use state::{ConfigSyncState, ResponseState, Route, TracerouteReport};
pub use stream::StateStream;

// Re-export the payload model at the crate root for ergonomics.
pub use meshly_api::{
    AdminRequest, AdminResponse, Channel, ChannelRole, ChannelSettings, ConfigPayload,
    ConfigSection, MeshPacket, ModuleConfigPayload, ModuleSection, NodeId, PacketBody, PacketId,
    RadioTransport, RouteDiscovery, RoutingError, RoutingPayload, UserConfig,
};
