// meshly-api: packet model and transport interface for mesh radio nodes

pub mod admin;
pub mod error;
pub mod packet;
pub mod transport;

pub use admin::{
    AdminRequest, AdminResponse, Channel, ChannelRole, ChannelSettings, ConfigPayload,
    ConfigSection, DeviceMetadata, ModuleConfigPayload, ModuleSection, UserConfig,
};
pub use error::Error;
pub use packet::{
    MeshPacket, NodeId, OutboundBody, OutboundPacket, PacketBody, PacketId, RouteDiscovery,
    RoutingError, RoutingPayload,
};
pub use transport::RadioTransport;
