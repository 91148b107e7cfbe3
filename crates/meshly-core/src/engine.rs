// ── Sync engine ──
//
// The correlated request/response state machine. Owns the single
// awaited-request slot and the ConfigSyncState, and turns matched
// responses into state mutations plus an optional chained request.
// Purely synchronous: the session worker drives it and performs the
// actual sends, which keeps every protocol step testable in isolation.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use meshly_api::{
    AdminRequest, AdminResponse, Channel, ChannelRole, ChannelSettings, ConfigPayload,
    ConfigSection, MeshPacket, ModuleSection, NodeId, PacketBody, PacketId, RouteDiscovery,
    RoutingPayload,
};

use crate::diff::role_for;
use crate::nodes::NodeDirectory;
use crate::state::{ConfigSyncState, Route, TracerouteReport};

// ── NextStep ────────────────────────────────────────────────────────

/// A chained request produced by interpreting a response.
///
/// Returned to the session worker instead of dispatched from inside
/// the interpreter; the worker turns it into a fresh send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NextStep {
    pub to: NodeId,
    pub request: AdminRequest,
}

// ── Awaited slot ────────────────────────────────────────────────────

/// The single-slot correlation table: the id we are waiting on and
/// the destination the request targeted.
#[derive(Debug, Clone, Copy)]
struct Awaited {
    id: PacketId,
    destination: NodeId,
}

// ── SyncEngine ──────────────────────────────────────────────────────

pub(crate) struct SyncEngine {
    local_node: NodeId,
    max_channels: u8,
    awaited: Option<Awaited>,
    state: ConfigSyncState,
    state_tx: watch::Sender<ConfigSyncState>,
    traceroute_tx: watch::Sender<Option<TracerouteReport>>,
    nodes: Arc<NodeDirectory>,
}

impl SyncEngine {
    pub(crate) fn new(
        local_node: NodeId,
        max_channels: u8,
        nodes: Arc<NodeDirectory>,
        state_tx: watch::Sender<ConfigSyncState>,
        traceroute_tx: watch::Sender<Option<TracerouteReport>>,
    ) -> Self {
        Self {
            local_node,
            max_channels,
            awaited: None,
            state: ConfigSyncState::default(),
            state_tx,
            traceroute_tx,
            nodes,
        }
    }

    pub(crate) fn max_channels(&self) -> u8 {
        self.max_channels
    }

    pub(crate) fn local_node(&self) -> NodeId {
        self.local_node
    }

    pub(crate) fn has_awaited(&self) -> bool {
        self.awaited.is_some()
    }

    // ── Dispatch bookkeeping ─────────────────────────────────────────

    /// Install `id` as the awaited request. A still-outstanding
    /// earlier request is silently orphaned; its eventual reply will
    /// no longer match anything.
    pub(crate) fn note_dispatched(&mut self, id: PacketId, destination: NodeId) {
        if let Some(prev) = self.awaited.replace(Awaited { id, destination }) {
            debug!(orphaned = %prev.id, "new dispatch overwrites outstanding request");
        }
    }

    /// Give up on the outstanding request (opt-in timeout policy).
    pub(crate) fn expire_awaited(&mut self) {
        let Some(awaited) = self.awaited.take() else {
            return;
        };
        warn!(id = %awaited.id, destination = %awaited.destination, "request timed out");
        self.state
            .set_error(format!("No response from {}", awaited.destination));
        self.publish();
    }

    // ── Caller commands ──────────────────────────────────────────────

    pub(crate) fn begin_route(&mut self, route: Route) {
        debug!(%route, "beginning configuration route");
        self.state.reset_for_route(route);
        self.publish();
    }

    pub(crate) fn clear(&mut self) {
        self.state.clear();
        self.publish();
    }

    pub(crate) fn set_total(&mut self, total: u32) {
        self.state.set_total(total);
        self.publish();
    }

    /// Persist the authoritative channel table after a local update.
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    pub(crate) fn replace_local_channels(&mut self, new: &[ChannelSettings]) {
        self.state.channel_list = new
            .iter()
            .enumerate()
            .map(|(index, settings)| Channel {
                index: index as u8,
                role: role_for(index, new.len()),
                settings: settings.clone(),
            })
            .collect();
        self.publish();
    }

    // ── Demultiplexing ───────────────────────────────────────────────

    /// Evaluate one received packet against the awaited slot.
    ///
    /// A match clears the slot before interpretation, so a response is
    /// consumed at most once. Non-matching packets are ignored and the
    /// outstanding request stays pending.
    pub(crate) fn handle_packet(&mut self, packet: &MeshPacket) -> Option<NextStep> {
        let awaited = self.awaited?;
        if packet.request_id != Some(awaited.id) {
            return None;
        }
        self.awaited = None;
        debug!(id = %awaited.id, from = %packet.from, "matched awaited response");

        if packet.from != awaited.destination {
            self.state.set_error(format!(
                "Unexpected sender: {} instead of {}.",
                packet.from, awaited.destination
            ));
            self.publish();
            return None;
        }

        match &packet.body {
            // Traceroute results are independent of the response state.
            PacketBody::Traceroute(discovery) => {
                self.record_traceroute(awaited.destination, discovery);
                None
            }
            PacketBody::Admin(response) => {
                if self.state.response_state.is_error() {
                    debug!("error state is sticky; dropping matched admin response");
                    return None;
                }
                self.interpret_admin(awaited.destination, response)
            }
            PacketBody::Routing(routing) => {
                if self.state.response_state.is_error() {
                    debug!("error state is sticky; dropping matched routing response");
                    return None;
                }
                self.interpret_routing(*routing);
                None
            }
        }
    }

    // ── Interpretation ───────────────────────────────────────────────

    fn interpret_admin(&mut self, from: NodeId, response: &AdminResponse) -> Option<NextStep> {
        match response {
            AdminResponse::Channel(channel) => self.interpret_channel(from, channel.clone()),
            AdminResponse::Owner(user) => {
                self.state.user_config = Some(user.clone());
                self.state.bump_completed();
                self.publish();
                None
            }
            AdminResponse::Config(config) => {
                if matches!(config, ConfigPayload::Unset) {
                    self.state.set_error(config.variant_name());
                }
                self.state.radio_config = Some(config.clone());
                self.state.bump_completed();
                self.publish();
                None
            }
            AdminResponse::ModuleConfig(config) => {
                if matches!(config, meshly_api::ModuleConfigPayload::Unset) {
                    self.state.set_error(config.variant_name());
                }
                self.state.module_config = Some(config.clone());
                self.state.bump_completed();
                self.publish();
                None
            }
            AdminResponse::CannedMessages(text) => {
                self.state.canned_messages = Some(text.clone());
                self.state.bump_completed();
                self.publish();
                Some(NextStep {
                    to: from,
                    request: AdminRequest::GetModuleConfig(ModuleSection::CannedMessage),
                })
            }
            AdminResponse::Ringtone(text) => {
                self.state.ringtone = Some(text.clone());
                self.state.bump_completed();
                self.publish();
                Some(NextStep {
                    to: from,
                    request: AdminRequest::GetModuleConfig(ModuleSection::ExternalNotification),
                })
            }
            AdminResponse::Metadata(_) => {
                // Not part of any configuration route.
                debug!("ignoring device metadata response");
                None
            }
        }
    }

    /// One step of channel pagination.
    ///
    /// A non-disabled slot keeps the walk going while the channel
    /// route is active and slots remain; a Disabled slot is the table
    /// sentinel and ends the walk immediately. Either way the walk
    /// pivots to fetching the LoRa config section when it stops.
    fn interpret_channel(&mut self, from: NodeId, channel: Channel) -> Option<NextStep> {
        if channel.index >= self.max_channels {
            warn!(index = channel.index, "channel index beyond table size; dropping response");
            return None;
        }

        let index = channel.index;
        let role = channel.role;
        self.state.upsert_channel(channel);
        self.state.bump_completed();

        let next = if role == ChannelRole::Disabled {
            let total = u32::try_from(self.state.channel_list.len())
                .unwrap_or(u32::MAX)
                .saturating_add(1);
            self.state.set_total(total);
            AdminRequest::GetConfig(ConfigSection::Lora)
        } else if index + 1 < self.max_channels && self.state.route == Route::Channels {
            AdminRequest::GetChannel(index + 1)
        } else {
            AdminRequest::GetConfig(ConfigSection::Lora)
        };
        self.publish();

        Some(NextStep {
            to: from,
            request: next,
        })
    }

    /// Terminal acknowledgment for a write. The sender check already
    /// passed, so a clean error code means the write landed.
    fn interpret_routing(&mut self, routing: RoutingPayload) {
        if routing.error.is_ok() {
            self.state.set_success(true);
        } else {
            self.state.set_error(routing.error.to_string());
        }
        self.publish();
    }

    fn record_traceroute(&mut self, destination: NodeId, discovery: &RouteDiscovery) {
        let mut names = Vec::with_capacity(discovery.route.len() + 2);
        names.push(self.nodes.display_name(destination));
        names.extend(discovery.route.iter().map(|hop| self.nodes.display_name(*hop)));
        names.push(self.nodes.display_name(self.local_node));

        debug!(%destination, hops = discovery.route.len(), "traceroute complete");
        self.traceroute_tx.send_replace(Some(TracerouteReport {
            destination,
            path: names.join(" --> "),
        }));
    }

    /// Broadcast the current state snapshot to subscribers.
    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}
