// Per-guild configuration. One row per guild with nullable channel/role
// columns, written with UPSERT semantics so setters never race on row
// creation. Also owns the dashboard login records (`web_users`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "!";

/// All configurable channel slots of a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Birthday,
    Sanctions,
    Welcome,
    BumpReminder,
    Fact,
    DynamicVoice,
}

impl ChannelKind {
    /// Column name in `guild_settings`.
    pub fn column(self) -> &'static str {
        match self {
            ChannelKind::Birthday => "birthday_channel_id",
            ChannelKind::Sanctions => "sanction_channel_id",
            ChannelKind::Welcome => "welcome_channel_id",
            ChannelKind::BumpReminder => "bump_reminder_channel_id",
            ChannelKind::Fact => "fact_channel_id",
            ChannelKind::DynamicVoice => "dynamic_voice_channel_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Bumper,
    QuizReward,
}

impl RoleKind {
    pub fn column(self) -> &'static str {
        match self {
            RoleKind::Bumper => "bumper_role_id",
            RoleKind::QuizReward => "quiz_reward_role_id",
        }
    }
}

/// Snapshot of a guild's settings row. Missing row means all-default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildSettings {
    pub prefix: Option<String>,
    pub birthday_channel: Option<u64>,
    pub sanctions_channel: Option<u64>,
    pub welcome_channel: Option<u64>,
    pub bump_reminder_channel: Option<u64>,
    pub fact_channel: Option<u64>,
    pub dynamic_voice_channel: Option<u64>,
    pub bumper_role: Option<u64>,
    pub quiz_reward_role: Option<u64>,
}

impl GuildSettings {
    pub fn channel(&self, kind: ChannelKind) -> Option<u64> {
        match kind {
            ChannelKind::Birthday => self.birthday_channel,
            ChannelKind::Sanctions => self.sanctions_channel,
            ChannelKind::Welcome => self.welcome_channel,
            ChannelKind::BumpReminder => self.bump_reminder_channel,
            ChannelKind::Fact => self.fact_channel,
            ChannelKind::DynamicVoice => self.dynamic_voice_channel,
        }
    }

    pub fn effective_prefix(&self) -> &str {
        self.prefix.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PREFIX)
    }
}

/// A guild that wants bump reminders, with its optional ping role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpReminderTarget {
    pub guild_id: u64,
    pub channel_id: u64,
    pub bumper_role: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, guild_id: u64) -> Result<GuildSettings, SettingsError>;

    async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), SettingsError>;

    async fn set_channel(
        &self,
        guild_id: u64,
        kind: ChannelKind,
        channel_id: Option<u64>,
    ) -> Result<(), SettingsError>;

    async fn set_role(
        &self,
        guild_id: u64,
        kind: RoleKind,
        role_id: Option<u64>,
    ) -> Result<(), SettingsError>;

    /// Every guild with a configured bump-reminder channel.
    async fn bump_reminder_targets(&self) -> Result<Vec<BumpReminderTarget>, SettingsError>;

    /// Record a dashboard login (`web_users` row, upserted).
    async fn record_web_login(
        &self,
        user_id: u64,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SettingsError>;
}

pub struct SettingsService<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn settings(&self, guild_id: u64) -> Result<GuildSettings, SettingsError> {
        self.store.get(guild_id).await
    }

    /// Effective command prefix, falling back to `!`.
    pub async fn prefix(&self, guild_id: u64) -> Result<String, SettingsError> {
        Ok(self.store.get(guild_id).await?.effective_prefix().to_string())
    }

    pub async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), SettingsError> {
        self.store.set_prefix(guild_id, prefix).await
    }

    pub async fn set_channel(
        &self,
        guild_id: u64,
        kind: ChannelKind,
        channel_id: Option<u64>,
    ) -> Result<(), SettingsError> {
        self.store.set_channel(guild_id, kind, channel_id).await
    }

    pub async fn set_role(
        &self,
        guild_id: u64,
        kind: RoleKind,
        role_id: Option<u64>,
    ) -> Result<(), SettingsError> {
        self.store.set_role(guild_id, kind, role_id).await
    }

    pub async fn bump_reminder_targets(&self) -> Result<Vec<BumpReminderTarget>, SettingsError> {
        self.store.bump_reminder_targets().await
    }

    pub async fn record_web_login(
        &self,
        user_id: u64,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SettingsError> {
        self.store.record_web_login(user_id, username, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_applies_when_unset_or_empty() {
        let mut settings = GuildSettings::default();
        assert_eq!(settings.effective_prefix(), "!");

        settings.prefix = Some(String::new());
        assert_eq!(settings.effective_prefix(), "!");

        settings.prefix = Some("?".to_string());
        assert_eq!(settings.effective_prefix(), "?");
    }

    #[test]
    fn channel_accessor_matches_kind() {
        let settings = GuildSettings {
            birthday_channel: Some(1),
            fact_channel: Some(2),
            ..Default::default()
        };
        assert_eq!(settings.channel(ChannelKind::Birthday), Some(1));
        assert_eq!(settings.channel(ChannelKind::Fact), Some(2));
        assert_eq!(settings.channel(ChannelKind::Welcome), None);
    }
}
