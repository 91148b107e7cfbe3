// ── Admin protocol payloads ──
//
// The device-configuration message family. Requests go out inside an
// OutboundPacket; responses come back as PacketBody::Admin entries in
// the received-packet stream. Section payloads are opaque bytes --
// their wire encoding belongs to the firmware, not to this crate.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ── Channels ────────────────────────────────────────────────────────

/// Role of a channel slot within the ordered channel table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelRole {
    Primary,
    Secondary,
    #[default]
    Disabled,
}

/// Settings carried by one channel slot.
///
/// The PSK is opaque here; key handling is the embedder's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub name: String,
    pub psk: Bytes,
}

impl ChannelSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            psk: Bytes::new(),
        }
    }
}

/// One slot in a radio's channel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Position in the table, 0-based.
    pub index: u8,
    pub role: ChannelRole,
    pub settings: ChannelSettings,
}

// ── Owner ───────────────────────────────────────────────────────────

/// The node owner record (long/short display names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub long_name: String,
    pub short_name: String,
    pub is_licensed: bool,
}

// ── Config sections ─────────────────────────────────────────────────

/// Radio configuration sections addressable by a config-get.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigSection {
    Device,
    Position,
    Power,
    Network,
    Display,
    Lora,
    Bluetooth,
}

/// Module configuration sections addressable by a module-config-get.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ModuleSection {
    Mqtt,
    Serial,
    ExternalNotification,
    StoreForward,
    RangeTest,
    Telemetry,
    CannedMessage,
    Audio,
    RemoteHardware,
}

/// A radio config snapshot for one section, or the unset marker a
/// radio returns when the section has never been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigPayload {
    Unset,
    Device(Bytes),
    Position(Bytes),
    Power(Bytes),
    Network(Bytes),
    Display(Bytes),
    Lora(Bytes),
    Bluetooth(Bytes),
}

impl ConfigPayload {
    /// The section this payload belongs to, or `None` for `Unset`.
    pub fn section(&self) -> Option<ConfigSection> {
        match self {
            Self::Unset => None,
            Self::Device(_) => Some(ConfigSection::Device),
            Self::Position(_) => Some(ConfigSection::Position),
            Self::Power(_) => Some(ConfigSection::Power),
            Self::Network(_) => Some(ConfigSection::Network),
            Self::Display(_) => Some(ConfigSection::Display),
            Self::Lora(_) => Some(ConfigSection::Lora),
            Self::Bluetooth(_) => Some(ConfigSection::Bluetooth),
        }
    }

    /// The variant tag name (`"unset"`, `"lora"`, ...).
    pub fn variant_name(&self) -> &'static str {
        self.into()
    }
}

/// Module config counterpart of [`ConfigPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ModuleConfigPayload {
    Unset,
    Mqtt(Bytes),
    Serial(Bytes),
    ExternalNotification(Bytes),
    StoreForward(Bytes),
    RangeTest(Bytes),
    Telemetry(Bytes),
    CannedMessage(Bytes),
    Audio(Bytes),
    RemoteHardware(Bytes),
}

impl ModuleConfigPayload {
    pub fn section(&self) -> Option<ModuleSection> {
        match self {
            Self::Unset => None,
            Self::Mqtt(_) => Some(ModuleSection::Mqtt),
            Self::Serial(_) => Some(ModuleSection::Serial),
            Self::ExternalNotification(_) => Some(ModuleSection::ExternalNotification),
            Self::StoreForward(_) => Some(ModuleSection::StoreForward),
            Self::RangeTest(_) => Some(ModuleSection::RangeTest),
            Self::Telemetry(_) => Some(ModuleSection::Telemetry),
            Self::CannedMessage(_) => Some(ModuleSection::CannedMessage),
            Self::Audio(_) => Some(ModuleSection::Audio),
            Self::RemoteHardware(_) => Some(ModuleSection::RemoteHardware),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        self.into()
    }
}

// ── Metadata ────────────────────────────────────────────────────────

/// Firmware/hardware description a radio can volunteer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub firmware_version: String,
    pub hw_model: String,
}

// ── Requests and responses ──────────────────────────────────────────

/// Outbound admin operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRequest {
    GetChannel(u8),
    GetOwner,
    GetConfig(ConfigSection),
    GetModuleConfig(ModuleSection),
    GetRingtone,
    GetCannedMessages,
    SetChannel(Channel),
    SetOwner(UserConfig),
    SetConfig(ConfigPayload),
    SetModuleConfig(ModuleConfigPayload),
    SetRingtone(String),
    SetCannedMessages(String),
}

impl AdminRequest {
    /// Whether this request mutates the destination.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::SetChannel(_)
                | Self::SetOwner(_)
                | Self::SetConfig(_)
                | Self::SetModuleConfig(_)
                | Self::SetRingtone(_)
                | Self::SetCannedMessages(_)
        )
    }
}

/// Inbound admin replies, demultiplexed by correlation id upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminResponse {
    Channel(Channel),
    Owner(UserConfig),
    Config(ConfigPayload),
    ModuleConfig(ModuleConfigPayload),
    CannedMessages(String),
    Ringtone(String),
    Metadata(DeviceMetadata),
}
