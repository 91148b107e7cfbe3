// ── Command API ──
//
// All session operations flow through a unified `Command` enum routed
// over an mpsc channel to the session worker. The reply resolves when
// the request is dispatched (or rejected); protocol completion is
// observed through the ResponseState, never through the reply.

use meshly_api::{
    Channel, ChannelSettings, ConfigPayload, ConfigSection, ModuleConfigPayload, ModuleSection,
    NodeId, PacketId, UserConfig,
};

use crate::error::CoreError;
use crate::state::Route;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations a session accepts.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Local state ──────────────────────────────────────────────────
    BeginRoute(Route),
    Clear,
    SetTotal(u32),

    // ── Reads ────────────────────────────────────────────────────────
    GetOwner {
        destination: NodeId,
    },
    GetChannel {
        destination: NodeId,
        index: u8,
    },
    GetConfig {
        destination: NodeId,
        section: ConfigSection,
    },
    GetModuleConfig {
        destination: NodeId,
        section: ModuleSection,
    },
    GetRingtone {
        destination: NodeId,
    },
    GetCannedMessages {
        destination: NodeId,
    },

    // ── Writes ───────────────────────────────────────────────────────
    SetOwner {
        destination: NodeId,
        user: UserConfig,
    },
    SetChannel {
        destination: NodeId,
        channel: Channel,
    },
    SetConfig {
        destination: NodeId,
        config: ConfigPayload,
    },
    SetModuleConfig {
        destination: NodeId,
        config: ModuleConfigPayload,
    },
    SetRingtone {
        destination: NodeId,
        ringtone: String,
    },
    SetCannedMessages {
        destination: NodeId,
        messages: String,
    },
    UpdateChannels {
        destination: NodeId,
        old: Vec<ChannelSettings>,
        new: Vec<ChannelSettings>,
    },

    // ── Diagnostics ──────────────────────────────────────────────────
    TraceRoute {
        destination: NodeId,
    },
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Local state mutated; nothing was sent.
    Ok,
    /// One correlated request left the radio; this is its id.
    Dispatched(PacketId),
    /// A channel update fanned out `sent` writes.
    ChannelUpdates { sent: usize },
}
