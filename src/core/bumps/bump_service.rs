// Disboard bump tracking. Per guild this is a two-state machine:
// cooling-down (a bump was recorded less than two hours ago) and ready.
// A reminder is sent at most once per cooling-down -> ready transition,
// gated by the reminder_sent flag which every new bump clears.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Disboard's application user id. Bump results only ever come from it.
pub const DISBOARD_USER_ID: u64 = 302_050_872_383_242_240;

/// Sentinel substrings Disboard uses in its success message (it localizes,
/// so both the English and German variants are recognized).
const SUCCESS_SENTINELS: [&str; 2] = ["Bump done", "Bump erfolgreich"];

pub fn bump_cooldown() -> Duration {
    Duration::hours(2)
}

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// Durable per-guild bump state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpState {
    pub last_bump: DateTime<Utc>,
    pub reminder_sent: bool,
}

/// What `/nextbump` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpAvailability {
    /// No bump was ever recorded for this guild.
    NeverBumped,
    Ready,
    CoolingDown { until: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct BumperTally {
    pub user_id: u64,
    pub count: u64,
}

#[derive(Debug, Error)]
pub enum BumpError {
    #[error("Storage error: {0}")]
    Storage(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait BumpStore: Send + Sync {
    /// Append one bump to the log.
    async fn log_bump(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), BumpError>;

    /// Atomically add one to the user's lifetime bump total.
    async fn increment_total(&self, guild_id: u64, user_id: u64) -> Result<(), BumpError>;

    /// Set last_bump and clear the reminder_sent flag in one write.
    async fn record_state(&self, guild_id: u64, at: DateTime<Utc>) -> Result<(), BumpError>;

    async fn get_state(&self, guild_id: u64) -> Result<Option<BumpState>, BumpError>;

    /// Flip reminder_sent to true. Called only after a successful send.
    async fn mark_reminder_sent(&self, guild_id: u64) -> Result<(), BumpError>;

    /// All guilds with recorded bump state, for the reminder sweep.
    async fn all_states(&self) -> Result<Vec<(u64, BumpState)>, BumpError>;

    /// Top bumpers. `since = None` reads lifetime totals; otherwise the
    /// append-only log is counted within the window.
    async fn top_bumpers(
        &self,
        guild_id: u64,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<BumperTally>, BumpError>;
}

// ============================================================================
// PURE DECISIONS
// ============================================================================

/// A reminder is due once the cooldown has elapsed and none was sent for
/// this window yet.
pub fn reminder_due(state: &BumpState, now: DateTime<Utc>) -> bool {
    !state.reminder_sent && now >= state.last_bump + bump_cooldown()
}

/// Recognize a successful Disboard bump and recover the bumper.
///
/// The triggering user is only taken from interaction metadata; Disboard
/// runs on slash commands, so a success message without it is ignored.
pub fn detect_successful_bump(
    author_id: u64,
    content: &str,
    embed_texts: &[String],
    interaction_user: Option<u64>,
) -> Option<u64> {
    if author_id != DISBOARD_USER_ID {
        return None;
    }
    let success = SUCCESS_SENTINELS
        .iter()
        .any(|s| content.contains(s) || embed_texts.iter().any(|t| t.contains(s)));
    if !success {
        return None;
    }
    interaction_user
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct BumpService<S: BumpStore> {
    store: S,
}

impl<S: BumpStore> BumpService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a detected bump: append the log row, bump the lifetime total
    /// and restart the cooldown window (clearing reminder_sent).
    pub async fn record_bump(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), BumpError> {
        self.store.log_bump(guild_id, user_id, at).await?;
        self.store.increment_total(guild_id, user_id).await?;
        self.store.record_state(guild_id, at).await?;
        Ok(())
    }

    pub async fn availability(
        &self,
        guild_id: u64,
        now: DateTime<Utc>,
    ) -> Result<BumpAvailability, BumpError> {
        let Some(state) = self.store.get_state(guild_id).await? else {
            return Ok(BumpAvailability::NeverBumped);
        };
        let until = state.last_bump + bump_cooldown();
        if now >= until {
            Ok(BumpAvailability::Ready)
        } else {
            Ok(BumpAvailability::CoolingDown { until })
        }
    }

    /// Guilds whose cooldown has elapsed without a reminder yet.
    pub async fn guilds_due_for_reminder(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<u64>, BumpError> {
        let states = self.store.all_states().await?;
        Ok(states
            .into_iter()
            .filter(|(_, state)| reminder_due(state, now))
            .map(|(guild_id, _)| guild_id)
            .collect())
    }

    /// Mark the reminder for this window as delivered.
    pub async fn confirm_reminder_sent(&self, guild_id: u64) -> Result<(), BumpError> {
        self.store.mark_reminder_sent(guild_id).await
    }

    pub async fn top_bumpers_all_time(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<BumperTally>, BumpError> {
        self.store.top_bumpers(guild_id, None, limit).await
    }

    pub async fn top_bumpers_since(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BumperTally>, BumpError> {
        self.store.top_bumpers(guild_id, Some(since), limit).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
