// Session-level tests driving a RadioSession over an in-memory
// transport: dispatch, demultiplexing, pagination chaining, channel
// updates, and the opt-in request timeout.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;

use meshly_api::{
    AdminRequest, AdminResponse, Channel, ChannelRole, ChannelSettings, ConfigSection, Error,
    MeshPacket, NodeId, OutboundBody, OutboundPacket, PacketBody, PacketId, RadioTransport,
    RouteDiscovery, RoutingError, RoutingPayload, UserConfig,
};
use meshly_core::{
    CommandResult, CoreError, RadioSession, ResponseState, Route, SessionConfig,
};

const LOCAL: NodeId = NodeId(0x0000_0001);
const DEST: NodeId = NodeId(0x0a0b_0c0d);

// ── In-memory transport ─────────────────────────────────────────────

/// Records outbound packets and lets tests inject inbound ones.
struct MemoryTransport {
    next_id: AtomicU32,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<(PacketId, OutboundPacket)>>,
    packets: broadcast::Sender<Arc<MeshPacket>>,
}

impl MemoryTransport {
    fn new() -> Arc<Self> {
        let (packets, _) = broadcast::channel(64);
        Arc::new(Self {
            next_id: AtomicU32::new(1),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            packets,
        })
    }

    fn sent_requests(&self) -> Vec<(PacketId, OutboundPacket)> {
        self.sent.lock().unwrap().clone()
    }

    fn last_sent(&self) -> (PacketId, OutboundPacket) {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }

    fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    fn inject(&self, packet: MeshPacket) {
        self.packets.send(Arc::new(packet)).unwrap();
    }
}

impl RadioTransport for MemoryTransport {
    fn send(
        &self,
        packet: OutboundPacket,
    ) -> impl std::future::Future<Output = Result<PacketId, Error>> + Send {
        let result = if self.fail_sends.load(Ordering::SeqCst) {
            Err(Error::SendFailed {
                reason: "link down".into(),
            })
        } else {
            let id = PacketId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.sent.lock().unwrap().push((id, packet));
            Ok(id)
        };
        async move { result }
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<MeshPacket>> {
        self.packets.subscribe()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (Arc<MemoryTransport>, RadioSession<Arc<MemoryTransport>>) {
    setup_with(SessionConfig::new(LOCAL)).await
}

async fn setup_with(
    config: SessionConfig,
) -> (Arc<MemoryTransport>, RadioSession<Arc<MemoryTransport>>) {
    let transport = MemoryTransport::new();
    let session = RadioSession::new(config, Arc::clone(&transport));
    session.start().await.unwrap();
    (transport, session)
}

fn admin_reply(id: PacketId, response: AdminResponse) -> MeshPacket {
    MeshPacket {
        from: DEST,
        to: LOCAL,
        request_id: Some(id),
        body: PacketBody::Admin(response),
    }
}

fn channel_reply(id: PacketId, index: u8, role: ChannelRole) -> MeshPacket {
    admin_reply(
        id,
        AdminResponse::Channel(Channel {
            index,
            role,
            settings: ChannelSettings::named(format!("ch{index}")),
        }),
    )
}

fn dispatched_id(result: CommandResult) -> PacketId {
    match result {
        CommandResult::Dispatched(id) => id,
        other => panic!("expected Dispatched, got {other:?}"),
    }
}

/// Poll until `condition` holds or two seconds pass.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn owner_fetch_round_trip() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Owner).await.unwrap();
    let id = dispatched_id(session.get_owner(DEST).await.unwrap());

    let user = UserConfig {
        long_name: "Summit Repeater".into(),
        short_name: "SR".into(),
        is_licensed: false,
    };
    transport.inject(admin_reply(id, AdminResponse::Owner(user.clone())));

    wait_until(|| state.latest().user_config.is_some()).await;
    let snapshot = state.latest();
    assert_eq!(snapshot.user_config, Some(user));
    assert_eq!(
        snapshot.response_state,
        ResponseState::Loading {
            total: 1,
            completed: 1
        }
    );
}

#[tokio::test]
async fn channel_pagination_chains_until_disabled_sentinel() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Channels).await.unwrap();
    let first = dispatched_id(session.get_channel(DEST, 0).await.unwrap());

    // Slot 0 keeps the walk going: the worker must request slot 1.
    transport.inject(channel_reply(first, 0, ChannelRole::Primary));
    wait_until(|| {
        matches!(
            transport.last_sent().1.body,
            OutboundBody::Admin(AdminRequest::GetChannel(1))
        )
    })
    .await;

    // The disabled sentinel ends pagination and pivots to LoRa config.
    let (second, _) = transport.last_sent();
    transport.inject(channel_reply(second, 1, ChannelRole::Disabled));
    wait_until(|| {
        matches!(
            transport.last_sent().1.body,
            OutboundBody::Admin(AdminRequest::GetConfig(ConfigSection::Lora))
        )
    })
    .await;

    let snapshot = state.latest();
    assert_eq!(snapshot.channel_list.len(), 2);
    assert_eq!(
        snapshot.response_state,
        ResponseState::Loading {
            total: 3,
            completed: 2
        }
    );

    // No further channel requests were issued for slots 2..7.
    let channel_gets = transport
        .sent_requests()
        .iter()
        .filter(|(_, p)| matches!(p.body, OutboundBody::Admin(AdminRequest::GetChannel(_))))
        .count();
    assert_eq!(channel_gets, 2);
}

#[tokio::test]
async fn sender_mismatch_surfaces_exact_error() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Owner).await.unwrap();
    let id = dispatched_id(session.get_owner(DEST).await.unwrap());

    let mut reply = admin_reply(id, AdminResponse::Owner(UserConfig::default()));
    reply.from = NodeId(0x1111_2222);
    transport.inject(reply);

    wait_until(|| state.latest().response_state.is_error()).await;
    assert_eq!(
        state.latest().response_state,
        ResponseState::Error(format!(
            "Unexpected sender: {} instead of {}.",
            NodeId(0x1111_2222),
            DEST
        ))
    );
    assert!(state.latest().user_config.is_none());
}

#[tokio::test]
async fn stale_response_is_ignored_after_overwriting_dispatch() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Ringtone).await.unwrap();
    let orphaned = dispatched_id(session.get_owner(DEST).await.unwrap());
    let current = dispatched_id(session.get_ringtone(DEST).await.unwrap());

    // The reply to the orphaned request no longer matches anything.
    transport.inject(admin_reply(orphaned, AdminResponse::Owner(UserConfig::default())));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.latest().user_config.is_none());

    // The reply to the live request is interpreted normally.
    transport.inject(admin_reply(current, AdminResponse::Ringtone("24:d=32:c".into())));
    wait_until(|| state.latest().ringtone.is_some()).await;
    assert_eq!(state.latest().ringtone.as_deref(), Some("24:d=32:c"));
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn clean_routing_ack_completes_a_write() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Owner).await.unwrap();
    let id = dispatched_id(
        session
            .set_owner(DEST, UserConfig::default())
            .await
            .unwrap(),
    );

    transport.inject(MeshPacket {
        from: DEST,
        to: LOCAL,
        request_id: Some(id),
        body: PacketBody::Routing(RoutingPayload {
            error: RoutingError::None,
        }),
    });

    wait_until(|| state.latest().response_state.is_terminal()).await;
    assert_eq!(state.latest().response_state, ResponseState::Success(true));
}

#[tokio::test]
async fn update_channels_writes_diff_and_persists_locally() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    let old = vec![ChannelSettings::named("main")];
    let new = vec![ChannelSettings::named("main"), ChannelSettings::named("alt")];

    let result = session.update_channels(LOCAL, old, new).await.unwrap();
    assert_eq!(result, CommandResult::ChannelUpdates { sent: 1 });

    let (_, written) = transport.last_sent();
    assert_eq!(written.to, LOCAL);
    match written.body {
        OutboundBody::Admin(AdminRequest::SetChannel(channel)) => {
            assert_eq!(channel.index, 1);
            assert_eq!(channel.role, ChannelRole::Secondary);
            assert_eq!(channel.settings.name, "alt");
        }
        other => panic!("expected SetChannel, got {other:?}"),
    }

    // Local destination: the authoritative table replaces our own list.
    wait_until(|| state.latest().channel_list.len() == 2).await;
    let roles: Vec<ChannelRole> = state
        .latest()
        .channel_list
        .iter()
        .map(|c| c.role)
        .collect();
    assert_eq!(roles, vec![ChannelRole::Primary, ChannelRole::Secondary]);
}

#[tokio::test]
async fn update_channels_for_remote_destination_does_not_persist() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    let old = vec![ChannelSettings::named("main")];
    let new = vec![ChannelSettings::named("renamed")];

    let result = session.update_channels(DEST, old, new).await.unwrap();
    assert_eq!(result, CommandResult::ChannelUpdates { sent: 1 });
    assert_eq!(transport.last_sent().1.to, DEST);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.latest().channel_list.is_empty());
}

// ── Failure paths ───────────────────────────────────────────────────

#[tokio::test]
async fn transport_failure_reports_once_and_keeps_awaited_request() {
    let (transport, session) = setup().await;
    let state = session.watch_state();

    session.begin_route(Route::Owner).await.unwrap();
    let live = dispatched_id(session.get_owner(DEST).await.unwrap());

    // A failed dispatch is reported to the caller and abandoned; the
    // earlier request stays awaited.
    transport.set_failing(true);
    let err = session
        .get_config(DEST, ConfigSection::Lora)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Transport { .. }));
    transport.set_failing(false);

    transport.inject(admin_reply(live, AdminResponse::Owner(UserConfig::default())));
    wait_until(|| state.latest().user_config.is_some()).await;
}

#[tokio::test]
async fn out_of_range_channel_index_is_rejected() {
    let (_transport, session) = setup().await;

    let err = session.get_channel(DEST, 8).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

// ── Timeout policy ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn optional_timeout_expires_an_unanswered_request() {
    let config = SessionConfig {
        request_timeout: Some(Duration::from_millis(250)),
        ..SessionConfig::new(LOCAL)
    };
    let (_transport, session) = setup_with(config).await;
    let state = session.watch_state();

    session.begin_route(Route::Owner).await.unwrap();
    session.get_owner(DEST).await.unwrap();

    wait_until(|| state.latest().response_state.is_error()).await;
    assert_eq!(
        state.latest().response_state,
        ResponseState::Error(format!("No response from {DEST}"))
    );
}

// ── Traceroute ──────────────────────────────────────────────────────

#[tokio::test]
async fn traceroute_report_renders_display_names() {
    let (transport, session) = setup().await;
    let mut reports = session.traceroute_reports();

    session.nodes().upsert(DEST, "Summit");
    session.nodes().upsert(LOCAL, "Base");

    let id = dispatched_id(session.trace_route(DEST).await.unwrap());
    transport.inject(MeshPacket {
        from: DEST,
        to: LOCAL,
        request_id: Some(id),
        body: PacketBody::Traceroute(RouteDiscovery {
            route: vec![NodeId(0x0000_00aa)],
        }),
    });

    tokio::time::timeout(Duration::from_secs(2), reports.changed())
        .await
        .expect("no traceroute report")
        .unwrap();
    let report = reports.borrow().clone().unwrap();
    assert_eq!(report.destination, DEST);
    assert_eq!(report.path, "Summit --> !000000aa --> Base");
}

// ── State stream ────────────────────────────────────────────────────

#[tokio::test]
async fn state_stream_yields_snapshots_in_order() {
    use futures_util::StreamExt;

    let (_transport, session) = setup().await;
    let mut stream = session.watch_state().into_stream();

    // First yield is the current snapshot.
    let initial = stream.next().await.unwrap();
    assert_eq!(initial.response_state, ResponseState::Empty);

    session.begin_route(Route::Channels).await.unwrap();
    let after_begin = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("no state update")
        .unwrap();
    assert_eq!(after_begin.route, Route::Channels);
    assert!(after_begin.response_state.is_loading());
}
