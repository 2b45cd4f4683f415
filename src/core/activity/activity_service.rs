// Guild activity statistics. Peak counters (`active_users`, `members`)
// only ever grow; the store keeps the maximum seen per guild. Channel
// and command usage are append-only logs aggregated at read time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuildPeaks {
    pub max_active_users: u32,
    pub max_members: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUsage {
    pub channel_id: u64,
    pub messages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUsage {
    pub command: String,
    pub uses: u64,
}

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Raise the stored peak to `count` if it is higher. Never lowers.
    async fn record_active_users(&self, guild_id: u64, count: u32) -> Result<(), ActivityError>;

    /// Raise the stored member peak to `count` if it is higher.
    async fn record_member_count(&self, guild_id: u64, count: u32) -> Result<(), ActivityError>;

    async fn peaks(&self, guild_id: u64) -> Result<GuildPeaks, ActivityError>;

    async fn log_channel_message(
        &self,
        guild_id: u64,
        channel_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError>;

    /// Busiest channels since `since`, most messages first.
    async fn top_channels(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelUsage>, ActivityError>;

    async fn log_command_use(
        &self,
        guild_id: u64,
        command: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError>;

    async fn top_commands(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommandUsage>, ActivityError>;
}

pub struct ActivityService<S: ActivityStore> {
    store: S,
}

impl<S: ActivityStore> ActivityService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Feed one presence sample into the peak tracker.
    pub async fn sample_active_users(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
        self.store.record_active_users(guild_id, count).await
    }

    pub async fn sample_member_count(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
        self.store.record_member_count(guild_id, count).await
    }

    pub async fn peaks(&self, guild_id: u64) -> Result<GuildPeaks, ActivityError> {
        self.store.peaks(guild_id).await
    }

    pub async fn log_message(
        &self,
        guild_id: u64,
        channel_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        self.store.log_channel_message(guild_id, channel_id, at).await
    }

    pub async fn top_channels(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelUsage>, ActivityError> {
        self.store.top_channels(guild_id, since, limit).await
    }

    pub async fn log_command(
        &self,
        guild_id: u64,
        command: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        self.store.log_command_use(guild_id, command, at).await
    }

    pub async fn top_commands(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommandUsage>, ActivityError> {
        self.store.top_commands(guild_id, since, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dashmap::DashMap;

    #[derive(Default)]
    struct MemoryActivityStore {
        peaks: DashMap<u64, GuildPeaks>,
        channel_log: DashMap<u64, Vec<(u64, DateTime<Utc>)>>,
        command_log: DashMap<u64, Vec<(String, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl ActivityStore for MemoryActivityStore {
        async fn record_active_users(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
            let mut entry = self.peaks.entry(guild_id).or_default();
            entry.max_active_users = entry.max_active_users.max(count);
            Ok(())
        }

        async fn record_member_count(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
            let mut entry = self.peaks.entry(guild_id).or_default();
            entry.max_members = entry.max_members.max(count);
            Ok(())
        }

        async fn peaks(&self, guild_id: u64) -> Result<GuildPeaks, ActivityError> {
            Ok(self.peaks.get(&guild_id).map(|p| *p).unwrap_or_default())
        }

        async fn log_channel_message(
            &self,
            guild_id: u64,
            channel_id: u64,
            at: DateTime<Utc>,
        ) -> Result<(), ActivityError> {
            self.channel_log
                .entry(guild_id)
                .or_default()
                .push((channel_id, at));
            Ok(())
        }

        async fn top_channels(
            &self,
            guild_id: u64,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<ChannelUsage>, ActivityError> {
            let mut counts: std::collections::HashMap<u64, u64> = Default::default();
            if let Some(log) = self.channel_log.get(&guild_id) {
                for (channel, at) in log.iter().filter(|(_, at)| *at > since) {
                    *counts.entry(*channel).or_default() += 1;
                }
            }
            let mut usage: Vec<ChannelUsage> = counts
                .into_iter()
                .map(|(channel_id, messages)| ChannelUsage {
                    channel_id,
                    messages,
                })
                .collect();
            usage.sort_by(|a, b| b.messages.cmp(&a.messages));
            usage.truncate(limit);
            Ok(usage)
        }

        async fn log_command_use(
            &self,
            guild_id: u64,
            command: &str,
            at: DateTime<Utc>,
        ) -> Result<(), ActivityError> {
            self.command_log
                .entry(guild_id)
                .or_default()
                .push((command.to_string(), at));
            Ok(())
        }

        async fn top_commands(
            &self,
            guild_id: u64,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<CommandUsage>, ActivityError> {
            let mut counts: std::collections::HashMap<String, u64> = Default::default();
            if let Some(log) = self.command_log.get(&guild_id) {
                for (command, at) in log.iter().filter(|(_, at)| *at > since) {
                    *counts.entry(command.clone()).or_default() += 1;
                }
            }
            let mut usage: Vec<CommandUsage> = counts
                .into_iter()
                .map(|(command, uses)| CommandUsage { command, uses })
                .collect();
            usage.sort_by(|a, b| b.uses.cmp(&a.uses));
            usage.truncate(limit);
            Ok(usage)
        }
    }

    #[tokio::test]
    async fn peaks_only_increase() {
        let service = ActivityService::new(MemoryActivityStore::default());
        service.sample_active_users(1, 10).await.unwrap();
        service.sample_active_users(1, 4).await.unwrap();
        service.sample_member_count(1, 100).await.unwrap();
        service.sample_member_count(1, 90).await.unwrap();

        let peaks = service.peaks(1).await.unwrap();
        assert_eq!(peaks.max_active_users, 10);
        assert_eq!(peaks.max_members, 100);
    }

    #[tokio::test]
    async fn top_channels_sorted_and_windowed() {
        let service = ActivityService::new(MemoryActivityStore::default());
        let now = Utc::now();
        for _ in 0..3 {
            service.log_message(1, 10, now).await.unwrap();
        }
        service.log_message(1, 20, now).await.unwrap();
        service
            .log_message(1, 20, now - Duration::days(40))
            .await
            .unwrap();

        let top = service
            .top_channels(1, now - Duration::days(30), 5)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ChannelUsage { channel_id: 10, messages: 3 });
        assert_eq!(top[1], ChannelUsage { channel_id: 20, messages: 1 });
    }

    #[tokio::test]
    async fn top_commands_respects_limit() {
        let service = ActivityService::new(MemoryActivityStore::default());
        let now = Utc::now();
        for cmd in ["rank", "rank", "quiz", "bump", "bump", "bump"] {
            service.log_command(1, cmd, now).await.unwrap();
        }
        let top = service
            .top_commands(1, now - Duration::days(1), 2)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].command, "bump");
        assert_eq!(top[0].uses, 3);
        assert_eq!(top[1].command, "rank");
    }
}
