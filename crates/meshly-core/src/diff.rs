// ── Channel-list diff ──
//
// Computes the minimal set of channel writes that turns one channel
// table into another. Slots are positional: role is derived from the
// index and the target list length, never taken from the inputs.

use meshly_api::{ChannelRole, ChannelSettings};

/// One channel write produced by [`diff_channels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub index: u8,
    pub role: ChannelRole,
    pub settings: ChannelSettings,
}

/// Role of slot `index` in a table of `new_len` entries.
///
/// Index 0 is always Primary; later slots inside the target list are
/// Secondary; slots past its end are Disabled (an explicit instruction
/// to clear a channel that no longer exists).
pub(crate) fn role_for(index: usize, new_len: usize) -> ChannelRole {
    if index == 0 {
        ChannelRole::Primary
    } else if index < new_len {
        ChannelRole::Secondary
    } else {
        ChannelRole::Disabled
    }
}

/// Diff two positional channel tables.
///
/// Walks indices 0..max(len(old), len(new)), treating a missing slot
/// as the default empty settings, and emits one update per changed
/// index, in increasing index order. Unchanged indices are never
/// emitted; `diff_channels(x, x)` is empty.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
pub fn diff_channels(old: &[ChannelSettings], new: &[ChannelSettings]) -> Vec<ChannelUpdate> {
    let len = old.len().max(new.len());
    let mut updates = Vec::new();

    for index in 0..len {
        let before = old.get(index);
        let after = new.get(index);

        let changed = match (before, after) {
            (Some(a), Some(b)) => a != b,
            (Some(a), None) => *a != ChannelSettings::default(),
            (None, Some(b)) => *b != ChannelSettings::default(),
            (None, None) => false,
        };
        if !changed {
            continue;
        }

        updates.push(ChannelUpdate {
            index: index as u8,
            role: role_for(index, new.len()),
            settings: after.cloned().unwrap_or_default(),
        });
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(name: &str) -> ChannelSettings {
        ChannelSettings::named(name)
    }

    #[test]
    fn identical_lists_produce_no_updates() {
        let list = vec![settings("main"), settings("alt")];
        assert!(diff_channels(&list, &list).is_empty());
        assert!(diff_channels(&[], &[]).is_empty());
    }

    #[test]
    fn changed_slot_is_emitted_once_with_positional_role() {
        let old = vec![settings("main"), settings("alt"), settings("ops")];
        let new = vec![settings("main"), settings("renamed"), settings("ops")];

        let updates = diff_channels(&old, &new);
        assert_eq!(
            updates,
            vec![ChannelUpdate {
                index: 1,
                role: ChannelRole::Secondary,
                settings: settings("renamed"),
            }]
        );
    }

    #[test]
    fn grown_list_adds_secondary_slots() {
        let old = vec![settings("main")];
        let new = vec![settings("main"), settings("alt")];

        let updates = diff_channels(&old, &new);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].index, 1);
        assert_eq!(updates[0].role, ChannelRole::Secondary);
    }

    #[test]
    fn shrunk_list_clears_trailing_slots_as_disabled() {
        let old = vec![settings("main"), settings("alt"), settings("ops")];
        let new = vec![settings("main")];

        let updates = diff_channels(&old, &new);
        assert_eq!(updates.len(), 2);

        assert_eq!(updates[0].index, 1);
        assert_eq!(updates[0].role, ChannelRole::Disabled);
        assert_eq!(updates[0].settings, ChannelSettings::default());

        assert_eq!(updates[1].index, 2);
        assert_eq!(updates[1].role, ChannelRole::Disabled);
    }

    #[test]
    fn updates_come_in_increasing_index_order() {
        let old = vec![settings("a"), settings("b"), settings("c"), settings("d")];
        let new = vec![settings("x"), settings("b"), settings("y"), settings("z")];

        let indices: Vec<u8> = diff_channels(&old, &new).iter().map(|u| u.index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
    }

    #[test]
    fn index_zero_is_always_primary() {
        let old = vec![settings("main")];
        let new = vec![settings("renamed")];

        let updates = diff_channels(&old, &new);
        assert_eq!(updates[0].role, ChannelRole::Primary);
    }

    #[test]
    fn default_filled_missing_slots_compare_equal() {
        // A trailing default slot in `old` matches the absence of a
        // slot in `new`, so nothing is emitted for it.
        let old = vec![settings("main"), ChannelSettings::default()];
        let new = vec![settings("main")];

        assert!(diff_channels(&old, &new).is_empty());
    }
}
