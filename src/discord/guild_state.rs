// Process-local per-guild state that is cheap to rebuild at startup:
// invite-use snapshots for join attribution and the set of temporary
// voice channels created by the join-to-create lobby.

use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
pub struct GuildState {
    /// Last known invite uses per guild, keyed by invite code.
    invite_uses: DashMap<u64, HashMap<String, u64>>,
    /// Temporary voice channels, mapped to the guild that owns them.
    temp_voice_channels: DashMap<u64, u64>,
}

impl GuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the invite snapshot for a guild (on ready and after joins).
    pub fn snapshot_invites(&self, guild_id: u64, uses: HashMap<String, u64>) {
        self.invite_uses.insert(guild_id, uses);
    }

    /// Compare fresh invite counts against the snapshot and return the code
    /// whose use count grew. Ambiguous diffs (zero or several codes) yield
    /// None; the caller then reports the join without attribution.
    pub fn diff_invites(&self, guild_id: u64, current: &HashMap<String, u64>) -> Option<String> {
        let previous = self.invite_uses.get(&guild_id);
        let mut grown: Vec<&String> = current
            .iter()
            .filter(|(code, uses)| {
                let before = previous
                    .as_ref()
                    .and_then(|snap| snap.get(*code).copied())
                    .unwrap_or(0);
                **uses > before
            })
            .map(|(code, _)| code)
            .collect();

        if grown.len() == 1 {
            grown.pop().cloned()
        } else {
            None
        }
    }

    pub fn register_temp_channel(&self, channel_id: u64, guild_id: u64) {
        self.temp_voice_channels.insert(channel_id, guild_id);
    }

    pub fn is_temp_channel(&self, channel_id: u64) -> bool {
        self.temp_voice_channels.contains_key(&channel_id)
    }

    /// Returns true when the channel was tracked and is now forgotten.
    pub fn forget_temp_channel(&self, channel_id: u64) -> bool {
        self.temp_voice_channels.remove(&channel_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uses(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(c, u)| (c.to_string(), *u)).collect()
    }

    #[test]
    fn single_grown_invite_is_attributed() {
        let state = GuildState::new();
        state.snapshot_invites(1, uses(&[("abc", 3), ("def", 1)]));

        let code = state.diff_invites(1, &uses(&[("abc", 4), ("def", 1)]));
        assert_eq!(code.as_deref(), Some("abc"));
    }

    #[test]
    fn ambiguous_or_empty_diffs_yield_none() {
        let state = GuildState::new();
        state.snapshot_invites(1, uses(&[("abc", 3), ("def", 1)]));

        assert_eq!(state.diff_invites(1, &uses(&[("abc", 3), ("def", 1)])), None);
        assert_eq!(state.diff_invites(1, &uses(&[("abc", 4), ("def", 2)])), None);
    }

    #[test]
    fn new_invites_count_from_zero() {
        let state = GuildState::new();
        state.snapshot_invites(1, uses(&[]));
        assert_eq!(
            state.diff_invites(1, &uses(&[("fresh", 1)])).as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn temp_channels_are_tracked_until_forgotten() {
        let state = GuildState::new();
        state.register_temp_channel(100, 1);
        state.register_temp_channel(200, 2);

        assert!(state.is_temp_channel(100));
        assert!(state.forget_temp_channel(100));
        assert!(!state.forget_temp_channel(100));
        assert!(!state.is_temp_channel(100));
        assert!(state.is_temp_channel(200));
    }
}
