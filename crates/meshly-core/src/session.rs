// ── Session abstraction ──
//
// Full lifecycle management for a radio sync session. Owns the
// command routing, the packet subscription, and the single worker
// that drives the sync engine. Dispatch and interpretation are
// serialized on that worker, so at most one matched response is ever
// interpreted at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use meshly_api::{
    AdminRequest, Channel, ChannelSettings, ConfigPayload, ConfigSection, MeshPacket,
    ModuleConfigPayload, ModuleSection, NodeId, OutboundPacket, RadioTransport, UserConfig,
};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::SessionConfig;
use crate::diff::diff_channels;
use crate::engine::{NextStep, SyncEngine};
use crate::error::CoreError;
use crate::nodes::NodeDirectory;
use crate::state::{ConfigSyncState, Route, TracerouteReport};
use crate::stream::StateStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── RadioSession ────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Construct with a
/// transport, call [`start()`](Self::start) to spawn the worker, then
/// issue commands and watch the state.
pub struct RadioSession<T: RadioTransport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: RadioTransport> Clone for RadioSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<T> {
    config: SessionConfig,
    transport: T,
    nodes: Arc<NodeDirectory>,
    state_rx: watch::Receiver<ConfigSyncState>,
    traceroute_rx: watch::Receiver<Option<TracerouteReport>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    /// Handed to the worker on start; the engine is never shared.
    engine: Mutex<Option<SyncEngine>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: RadioTransport> RadioSession<T> {
    /// Create a new session over `transport`. Does NOT start the
    /// worker -- call [`start()`](Self::start).
    pub fn new(config: SessionConfig, transport: T) -> Self {
        let (state_tx, state_rx) = watch::channel(ConfigSyncState::default());
        let (traceroute_tx, traceroute_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let nodes = Arc::new(NodeDirectory::new());

        let engine = SyncEngine::new(
            config.local_node,
            config.max_channels,
            Arc::clone(&nodes),
            state_tx,
            traceroute_tx,
        );

        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                nodes,
                state_rx,
                traceroute_rx,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                engine: Mutex::new(Some(engine)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Access the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Access the node directory feeding traceroute display names.
    pub fn nodes(&self) -> &Arc<NodeDirectory> {
        &self.inner.nodes
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the session worker: subscribes to the packet stream and
    /// starts processing commands.
    pub async fn start(&self) -> Result<(), CoreError> {
        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            return Err(CoreError::Internal("session already started".into()));
        };
        let Some(engine) = self.inner.engine.lock().await.take() else {
            return Err(CoreError::Internal("session already started".into()));
        };

        let packet_rx = self.inner.transport.subscribe();
        let session = self.clone();
        let handle = tokio::spawn(session_task(session, engine, command_rx, packet_rx));
        self.inner.task_handles.lock().await.push(handle);

        info!("session started");
        Ok(())
    }

    /// Stop the worker and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("session stopped");
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to the aggregated sync state.
    pub fn watch_state(&self) -> StateStream {
        StateStream::new(self.inner.state_rx.clone())
    }

    /// Subscribe to traceroute reports. Transient results, independent
    /// of the sync state.
    pub fn traceroute_reports(&self) -> watch::Receiver<Option<TracerouteReport>> {
        self.inner.traceroute_rx.clone()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a command to the worker and wait for the dispatch outcome.
    ///
    /// The reply resolves once the request leaves the radio (or is
    /// rejected); protocol completion is observed through the
    /// ResponseState.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::SessionClosed)?;
        response_rx.await.map_err(|_| CoreError::SessionClosed)?
    }

    /// Reset the state and enter `route` with a fresh Loading state.
    pub async fn begin_route(&self, route: Route) -> Result<CommandResult, CoreError> {
        self.execute(Command::BeginRoute(route)).await
    }

    /// Reset the state to Empty. The only way out of a sticky error.
    pub async fn clear(&self) -> Result<CommandResult, CoreError> {
        self.execute(Command::Clear).await
    }

    /// Revise the expected step count of the current route.
    pub async fn set_total(&self, total: u32) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetTotal(total)).await
    }

    pub async fn get_owner(&self, destination: NodeId) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetOwner { destination }).await
    }

    pub async fn get_channel(
        &self,
        destination: NodeId,
        index: u8,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetChannel { destination, index }).await
    }

    pub async fn get_config(
        &self,
        destination: NodeId,
        section: ConfigSection,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetConfig {
            destination,
            section,
        })
        .await
    }

    pub async fn get_module_config(
        &self,
        destination: NodeId,
        section: ModuleSection,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetModuleConfig {
            destination,
            section,
        })
        .await
    }

    pub async fn get_ringtone(&self, destination: NodeId) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetRingtone { destination }).await
    }

    pub async fn get_canned_messages(
        &self,
        destination: NodeId,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::GetCannedMessages { destination }).await
    }

    pub async fn set_owner(
        &self,
        destination: NodeId,
        user: UserConfig,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetOwner { destination, user }).await
    }

    pub async fn set_channel(
        &self,
        destination: NodeId,
        channel: Channel,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetChannel {
            destination,
            channel,
        })
        .await
    }

    pub async fn set_config(
        &self,
        destination: NodeId,
        config: ConfigPayload,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetConfig {
            destination,
            config,
        })
        .await
    }

    pub async fn set_module_config(
        &self,
        destination: NodeId,
        config: ModuleConfigPayload,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetModuleConfig {
            destination,
            config,
        })
        .await
    }

    pub async fn set_ringtone(
        &self,
        destination: NodeId,
        ringtone: impl Into<String>,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetRingtone {
            destination,
            ringtone: ringtone.into(),
        })
        .await
    }

    pub async fn set_canned_messages(
        &self,
        destination: NodeId,
        messages: impl Into<String>,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetCannedMessages {
            destination,
            messages: messages.into(),
        })
        .await
    }

    /// Diff `old` against `new` and write every changed slot to the
    /// destination, in increasing index order.
    pub async fn update_channels(
        &self,
        destination: NodeId,
        old: Vec<ChannelSettings>,
        new: Vec<ChannelSettings>,
    ) -> Result<CommandResult, CoreError> {
        self.execute(Command::UpdateChannels {
            destination,
            old,
            new,
        })
        .await
    }

    pub async fn trace_route(&self, destination: NodeId) -> Result<CommandResult, CoreError> {
        self.execute(Command::TraceRoute { destination }).await
    }
}

// ── Session worker ──────────────────────────────────────────────────

/// Single worker owning the engine: processes commands, watches the
/// packet stream, performs chained dispatches, and enforces the
/// optional request timeout.
async fn session_task<T: RadioTransport>(
    session: RadioSession<T>,
    mut engine: SyncEngine,
    mut command_rx: mpsc::Receiver<CommandEnvelope>,
    mut packet_rx: broadcast::Receiver<Arc<MeshPacket>>,
) {
    let cancel = session.inner.cancel.clone();
    let timeout = session.inner.config.request_timeout;
    let mut deadline: Option<Instant> = None;

    loop {
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = expiry => {
                engine.expire_awaited();
                deadline = None;
            }
            envelope = command_rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&session, &mut engine, envelope.command).await;
                let dispatched = match &result {
                    Ok(CommandResult::Dispatched(_)) => true,
                    Ok(CommandResult::ChannelUpdates { sent }) => *sent > 0,
                    _ => false,
                };
                let _ = envelope.response_tx.send(result);

                if dispatched {
                    deadline = next_deadline(timeout);
                } else if !engine.has_awaited() {
                    deadline = None;
                }
            }
            packet = packet_rx.recv() => {
                match packet {
                    Ok(packet) => {
                        if let Some(step) = engine.handle_packet(&packet) {
                            let dispatched = dispatch_step(&session, &mut engine, step).await;
                            deadline = if dispatched { next_deadline(timeout) } else { None };
                        } else if !engine.has_awaited() {
                            deadline = None;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "packet stream lagged; continuing");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("packet stream closed; stopping session worker");
                        break;
                    }
                }
            }
        }
    }
}

fn next_deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|t| Instant::now() + t)
}

/// Perform a chained dispatch produced by the interpreter. There is no
/// caller to report to; a transport failure abandons the route.
async fn dispatch_step<T: RadioTransport>(
    session: &RadioSession<T>,
    engine: &mut SyncEngine,
    step: NextStep,
) -> bool {
    match session
        .inner
        .transport
        .send(OutboundPacket::admin(step.to, step.request))
        .await
    {
        Ok(id) => {
            engine.note_dispatched(id, step.to);
            true
        }
        Err(e) => {
            warn!(error = %e, to = %step.to, "chained request failed; abandoning route");
            false
        }
    }
}

// ── Command routing ─────────────────────────────────────────────────

/// Route a command to the transport or the engine.
#[allow(clippy::too_many_lines)]
async fn route_command<T: RadioTransport>(
    session: &RadioSession<T>,
    engine: &mut SyncEngine,
    command: Command,
) -> Result<CommandResult, CoreError> {
    match command {
        // ── Local state ──────────────────────────────────────────────
        Command::BeginRoute(route) => {
            engine.begin_route(route);
            Ok(CommandResult::Ok)
        }
        Command::Clear => {
            engine.clear();
            Ok(CommandResult::Ok)
        }
        Command::SetTotal(total) => {
            engine.set_total(total);
            Ok(CommandResult::Ok)
        }

        // ── Reads ────────────────────────────────────────────────────
        Command::GetOwner { destination } => {
            dispatch_admin(session, engine, destination, AdminRequest::GetOwner).await
        }
        Command::GetChannel { destination, index } => {
            require_channel_index(engine, index)?;
            dispatch_admin(session, engine, destination, AdminRequest::GetChannel(index)).await
        }
        Command::GetConfig {
            destination,
            section,
        } => dispatch_admin(session, engine, destination, AdminRequest::GetConfig(section)).await,
        Command::GetModuleConfig {
            destination,
            section,
        } => {
            dispatch_admin(
                session,
                engine,
                destination,
                AdminRequest::GetModuleConfig(section),
            )
            .await
        }
        Command::GetRingtone { destination } => {
            dispatch_admin(session, engine, destination, AdminRequest::GetRingtone).await
        }
        Command::GetCannedMessages { destination } => {
            dispatch_admin(session, engine, destination, AdminRequest::GetCannedMessages).await
        }

        // ── Writes ───────────────────────────────────────────────────
        Command::SetOwner { destination, user } => {
            dispatch_admin(session, engine, destination, AdminRequest::SetOwner(user)).await
        }
        Command::SetChannel {
            destination,
            channel,
        } => {
            require_channel_index(engine, channel.index)?;
            dispatch_admin(session, engine, destination, AdminRequest::SetChannel(channel)).await
        }
        Command::SetConfig {
            destination,
            config,
        } => dispatch_admin(session, engine, destination, AdminRequest::SetConfig(config)).await,
        Command::SetModuleConfig {
            destination,
            config,
        } => {
            dispatch_admin(
                session,
                engine,
                destination,
                AdminRequest::SetModuleConfig(config),
            )
            .await
        }
        Command::SetRingtone {
            destination,
            ringtone,
        } => {
            dispatch_admin(
                session,
                engine,
                destination,
                AdminRequest::SetRingtone(ringtone),
            )
            .await
        }
        Command::SetCannedMessages {
            destination,
            messages,
        } => {
            dispatch_admin(
                session,
                engine,
                destination,
                AdminRequest::SetCannedMessages(messages),
            )
            .await
        }
        Command::UpdateChannels {
            destination,
            old,
            new,
        } => update_channel_table(session, engine, destination, &old, &new).await,

        // ── Diagnostics ──────────────────────────────────────────────
        Command::TraceRoute { destination } => {
            let id = session
                .inner
                .transport
                .send(OutboundPacket::traceroute(destination))
                .await?;
            engine.note_dispatched(id, destination);
            Ok(CommandResult::Dispatched(id))
        }
    }
}

/// Send one correlated admin request. On success the id becomes the
/// awaited request; on failure the awaited slot is left unchanged and
/// the error goes back to the caller.
async fn dispatch_admin<T: RadioTransport>(
    session: &RadioSession<T>,
    engine: &mut SyncEngine,
    destination: NodeId,
    request: AdminRequest,
) -> Result<CommandResult, CoreError> {
    let id = session
        .inner
        .transport
        .send(OutboundPacket::admin(destination, request))
        .await?;
    engine.note_dispatched(id, destination);
    Ok(CommandResult::Dispatched(id))
}

/// Diff the channel tables and write every changed slot, in index
/// order. For the local radio the new table also replaces the
/// session's own channel list once all writes are issued.
async fn update_channel_table<T: RadioTransport>(
    session: &RadioSession<T>,
    engine: &mut SyncEngine,
    destination: NodeId,
    old: &[ChannelSettings],
    new: &[ChannelSettings],
) -> Result<CommandResult, CoreError> {
    let max = usize::from(engine.max_channels());
    if old.len() > max || new.len() > max {
        return Err(CoreError::ValidationFailed {
            message: format!("channel list exceeds the {max} slot table"),
        });
    }

    let updates = diff_channels(old, new);
    let mut sent = 0usize;
    for update in updates {
        let channel = Channel {
            index: update.index,
            role: update.role,
            settings: update.settings,
        };
        let id = session
            .inner
            .transport
            .send(OutboundPacket::admin(
                destination,
                AdminRequest::SetChannel(channel),
            ))
            .await?;
        engine.note_dispatched(id, destination);
        sent += 1;
    }

    if destination == engine.local_node() {
        engine.replace_local_channels(new);
    }

    debug!(%destination, sent, "channel update dispatched");
    Ok(CommandResult::ChannelUpdates { sent })
}

fn require_channel_index(engine: &SyncEngine, index: u8) -> Result<(), CoreError> {
    if index >= engine.max_channels() {
        return Err(CoreError::ValidationFailed {
            message: format!(
                "channel index {index} out of range (max {})",
                engine.max_channels()
            ),
        });
    }
    Ok(())
}
