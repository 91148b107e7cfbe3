// ── Observable sync state ──
//
// ConfigSyncState is the aggregated, externally visible outcome of a
// configuration route: the accumulated channel table, per-section
// config snapshots, and the ResponseState machine. Mutated exclusively
// by the sync engine; consumers watch it through `StateStream`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshly_api::{Channel, ConfigPayload, ModuleConfigPayload, NodeId, UserConfig};

// ── Route ───────────────────────────────────────────────────────────

/// The logical configuration route a session is walking.
///
/// A route scopes one multi-step retrieval; `Channels` is the only
/// route that keeps channel pagination going slot by slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Route {
    #[default]
    Idle,
    Owner,
    Channels,
    RadioConfig,
    ModuleConfig,
    CannedMessages,
    Ringtone,
}

// ── ResponseState ───────────────────────────────────────────────────

/// Progress of the current multi-step remote operation.
///
/// Empty → Loading → Success | Error; back to Empty only via explicit
/// clear. Success is reached only through a routing acknowledgment,
/// never by exhausting the read pipeline. Error is sticky.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseState {
    #[default]
    Empty,
    Loading {
        total: u32,
        completed: u32,
    },
    Success(bool),
    Error(String),
}

impl ResponseState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }
}

// ── ConfigSyncState ─────────────────────────────────────────────────

/// Aggregated configuration snapshot for the active route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSyncState {
    pub route: Route,
    pub user_config: Option<UserConfig>,
    /// Accumulated channel table, kept in index order.
    pub channel_list: Vec<Channel>,
    pub radio_config: Option<ConfigPayload>,
    pub module_config: Option<ModuleConfigPayload>,
    pub ringtone: Option<String>,
    pub canned_messages: Option<String>,
    pub response_state: ResponseState,
    /// When the last correlated response was interpreted.
    pub last_response_at: Option<DateTime<Utc>>,
}

impl ConfigSyncState {
    /// Reset everything and enter `route` with a fresh Loading state.
    pub(crate) fn reset_for_route(&mut self, route: Route) {
        *self = Self {
            route,
            response_state: ResponseState::Loading {
                total: 1,
                completed: 0,
            },
            ..Self::default()
        };
    }

    /// Reset to the initial Empty state.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Insert `channel` at its index, replacing any prior value there.
    /// The list stays sorted by index.
    pub(crate) fn upsert_channel(&mut self, channel: Channel) {
        match self
            .channel_list
            .binary_search_by_key(&channel.index, |c| c.index)
        {
            Ok(pos) => self.channel_list[pos] = channel,
            Err(pos) => self.channel_list.insert(pos, channel),
        }
    }

    /// Count one successfully interpreted response.
    pub(crate) fn bump_completed(&mut self) {
        if let ResponseState::Loading { completed, .. } = &mut self.response_state {
            *completed += 1;
        }
        self.last_response_at = Some(Utc::now());
    }

    /// Revise the expected step count of the current Loading state.
    pub(crate) fn set_total(&mut self, new_total: u32) {
        if let ResponseState::Loading { total, .. } = &mut self.response_state {
            *total = new_total;
        }
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.response_state = ResponseState::Error(message.into());
    }

    pub(crate) fn set_success(&mut self, ok: bool) {
        self.response_state = ResponseState::Success(ok);
    }
}

// ── Traceroute ──────────────────────────────────────────────────────

/// Rendered result of a traceroute probe. Transient and independent
/// of [`ResponseState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerouteReport {
    /// The node the probe targeted.
    pub destination: NodeId,
    /// Display-name chain from the destination back to the local node.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshly_api::{ChannelRole, ChannelSettings};

    fn channel(index: u8, name: &str) -> Channel {
        Channel {
            index,
            role: if index == 0 {
                ChannelRole::Primary
            } else {
                ChannelRole::Secondary
            },
            settings: ChannelSettings::named(name),
        }
    }

    #[test]
    fn upsert_keeps_index_order() {
        let mut state = ConfigSyncState::default();
        state.upsert_channel(channel(2, "c"));
        state.upsert_channel(channel(0, "a"));
        state.upsert_channel(channel(1, "b"));

        let indices: Vec<u8> = state.channel_list.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn upsert_replaces_existing_index() {
        let mut state = ConfigSyncState::default();
        state.upsert_channel(channel(1, "old"));
        state.upsert_channel(channel(1, "new"));

        assert_eq!(state.channel_list.len(), 1);
        assert_eq!(state.channel_list[0].settings.name, "new");
    }

    #[test]
    fn reset_for_route_starts_loading() {
        let mut state = ConfigSyncState::default();
        state.user_config = Some(UserConfig::default());
        state.reset_for_route(Route::Channels);

        assert_eq!(state.route, Route::Channels);
        assert_eq!(
            state.response_state,
            ResponseState::Loading {
                total: 1,
                completed: 0
            }
        );
        assert!(state.user_config.is_none());
    }

    #[test]
    fn bump_completed_only_counts_while_loading() {
        let mut state = ConfigSyncState::default();
        state.bump_completed();
        assert_eq!(state.response_state, ResponseState::Empty);

        state.reset_for_route(Route::Owner);
        state.bump_completed();
        assert_eq!(
            state.response_state,
            ResponseState::Loading {
                total: 1,
                completed: 1
            }
        );
    }

    #[test]
    fn clear_returns_to_empty() {
        let mut state = ConfigSyncState::default();
        state.reset_for_route(Route::Owner);
        state.set_error("boom");
        state.clear();

        assert_eq!(state.response_state, ResponseState::Empty);
        assert_eq!(state.route, Route::Idle);
    }
}
