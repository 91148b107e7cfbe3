// ── Core packet model ──
//
// NodeId and PacketId form the foundation of every message exchanged
// with a radio. A MeshPacket is one entry in the received-packet
// stream; the transport hands them out as-is, with no reply routing --
// correlation against the embedded request id is the consumer's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::admin::{AdminRequest, AdminResponse};

// ── NodeId ──────────────────────────────────────────────────────────

/// Address of a node on the mesh.
///
/// Renders in the conventional `!%08x` user-id form, which is also
/// the placeholder name for nodes without a known display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The all-nodes broadcast address.
    pub const BROADCAST: NodeId = NodeId(0xffff_ffff);

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('!').unwrap_or(s);
        u32::from_str_radix(hex, 16).map(Self)
    }
}

// ── PacketId ────────────────────────────────────────────────────────

/// Transport-assigned packet identifier, echoed back by replies as
/// their `request_id`. The correlation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u32);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u32> for PacketId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

// ── Received packets ────────────────────────────────────────────────

/// One entry in the received-packet stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshPacket {
    /// Sender address.
    pub from: NodeId,
    /// Destination address (may be broadcast).
    pub to: NodeId,
    /// Id of the outbound request this packet replies to, if any.
    pub request_id: Option<PacketId>,
    /// Decoded payload.
    pub body: PacketBody,
}

/// The payload families a received packet can carry.
///
/// Wire encoding, compression, and encryption live below this layer;
/// the transport hands the core already-decoded payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketBody {
    /// Device-configuration reply.
    Admin(AdminResponse),
    /// Delivery acknowledgment / failure for a previous write.
    Routing(RoutingPayload),
    /// Hop list from a traceroute probe.
    Traceroute(RouteDiscovery),
}

// ── Routing payloads ────────────────────────────────────────────────

/// Ack/nack for an earlier outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPayload {
    pub error: RoutingError,
}

/// Delivery failure reasons reported by the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingError {
    /// Delivered successfully.
    None,
    NoRoute,
    GotNak,
    Timeout,
    NoInterface,
    MaxRetransmit,
    NoChannel,
    TooLarge,
    NoResponse,
    DutyCycleLimit,
    BadRequest,
    NotAuthorized,
}

impl RoutingError {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::None)
    }
}

// ── Traceroute payloads ─────────────────────────────────────────────

/// Ordered list of the intermediate nodes a traceroute probe crossed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDiscovery {
    pub route: Vec<NodeId>,
}

// ── Outbound packets ────────────────────────────────────────────────

/// A packet handed to the transport for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Destination address.
    pub to: NodeId,
    /// What to send.
    pub body: OutboundBody,
    /// Ask the destination to reply with a correlated response.
    pub want_response: bool,
}

impl OutboundPacket {
    /// An admin request expecting a correlated reply.
    pub fn admin(to: NodeId, request: AdminRequest) -> Self {
        Self {
            to,
            body: OutboundBody::Admin(request),
            want_response: true,
        }
    }

    /// A traceroute probe towards `to`.
    pub fn traceroute(to: NodeId) -> Self {
        Self {
            to,
            body: OutboundBody::Traceroute,
            want_response: true,
        }
    }
}

/// Outbound payload families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    Admin(AdminRequest),
    Traceroute,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn node_id_displays_as_user_id() {
        assert_eq!(NodeId(0x1a2b_3c4d).to_string(), "!1a2b3c4d");
    }

    #[test]
    fn node_id_parses_with_and_without_bang() {
        let with: NodeId = "!1a2b3c4d".parse().unwrap();
        let without: NodeId = "1a2b3c4d".parse().unwrap();
        assert_eq!(with, NodeId(0x1a2b_3c4d));
        assert_eq!(with, without);
    }

    #[test]
    fn broadcast_is_recognized() {
        assert!(NodeId::BROADCAST.is_broadcast());
        assert!(!NodeId(1).is_broadcast());
    }

    #[test]
    fn routing_error_renders_code_name() {
        assert_eq!(RoutingError::MaxRetransmit.to_string(), "MAX_RETRANSMIT");
        assert!(RoutingError::None.is_ok());
        assert!(!RoutingError::NoRoute.is_ok());
    }
}
