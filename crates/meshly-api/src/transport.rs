//! Transport seam between the sync core and the packet delivery
//! service.
//!
//! Implementations wrap whatever actually moves bytes (serial link,
//! BLE bridge, TCP proxy) and expose two things: a fallible `send`
//! that returns the transport-assigned correlation id, and a broadcast
//! subscription to the full received-packet stream. There is no reply
//! routing at this layer -- every subscriber sees every packet, and
//! matching responses to requests is the consumer's job.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::Error;
use crate::packet::{MeshPacket, OutboundPacket, PacketId};

/// A packet delivery service the sync core can drive.
pub trait RadioTransport: Send + Sync + 'static {
    /// Send one outbound packet.
    ///
    /// Returns the id assigned to the packet; correlated replies echo
    /// it as their `request_id`.
    fn send(&self, packet: OutboundPacket)
    -> impl Future<Output = Result<PacketId, Error>> + Send;

    /// Subscribe to the stream of received packets.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    fn subscribe(&self) -> broadcast::Receiver<Arc<MeshPacket>>;
}

impl<T: RadioTransport> RadioTransport for Arc<T> {
    fn send(
        &self,
        packet: OutboundPacket,
    ) -> impl Future<Output = Result<PacketId, Error>> + Send {
        self.as_ref().send(packet)
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<MeshPacket>> {
        self.as_ref().subscribe()
    }
}
