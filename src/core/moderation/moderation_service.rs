// Moderation records and escalation. Every sanction is an append-only log
// row; nothing is ever mutated after the fact. The only decision logic is
// the warn escalation: two warns within 24 hours earn an automatic
// 24-hour timeout.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Warns inside this window count towards escalation.
pub fn warn_window() -> Duration {
    Duration::hours(24)
}

/// Recent warns at or above this trigger the automatic timeout.
pub const ESCALATION_THRESHOLD: usize = 2;

/// Duration of the automatic timeout, in minutes.
pub const AUTO_TIMEOUT_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone)]
pub struct WarnRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Result of recording a warn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnOutcome {
    /// Warns within the escalation window, including the one just recorded.
    pub recent_warns: usize,
    /// True when the caller should apply the automatic timeout.
    pub escalate: bool,
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ModerationStore: Send + Sync {
    async fn add_warn(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError>;

    async fn warns_since(
        &self,
        guild_id: u64,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<WarnRecord>, ModerationError>;

    async fn add_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        minutes: u32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError>;

    async fn add_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError>;
}

pub struct ModerationService<S: ModerationStore> {
    store: S,
}

impl<S: ModerationStore> ModerationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a warn and report whether escalation is due.
    ///
    /// The service only decides; applying the platform timeout (and
    /// recording it via [`record_timeout`](Self::record_timeout)) is the
    /// caller's job, since it can fail on permissions.
    pub async fn record_warn(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<WarnOutcome, ModerationError> {
        self.store.add_warn(guild_id, user_id, reason, now).await?;
        let recent = self
            .store
            .warns_since(guild_id, user_id, now - warn_window())
            .await?;
        Ok(WarnOutcome {
            recent_warns: recent.len(),
            escalate: recent.len() >= ESCALATION_THRESHOLD,
        })
    }

    pub async fn record_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        minutes: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        self.store
            .add_timeout(guild_id, user_id, minutes, reason, now)
            .await
    }

    pub async fn record_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        self.store.add_ban(guild_id, user_id, reason, now).await
    }

    pub async fn recent_warns(
        &self,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        self.store
            .warns_since(guild_id, user_id, now - warn_window())
            .await
    }
}
