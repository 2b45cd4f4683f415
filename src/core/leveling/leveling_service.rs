// Leveling business logic. A member's level is derived purely from their
// lifetime message counter, so the only state is one monotonically
// increasing integer per (guild, user).

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One member's leveling row in a guild.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub username: String,
    /// Lifetime message count. Never decreases.
    pub counter: u64,
    pub level: u32,
}

/// Snapshot returned after a message is counted.
#[derive(Debug, Clone, Copy)]
pub struct MemberProgress {
    pub counter: u64,
    pub level: u32,
    /// Fraction of the way from the current level threshold to the next,
    /// always in [0, 1].
    pub progress: f64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid user or guild ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for message counters. The increment must be atomic so that
/// concurrent message events never lose a count.
#[async_trait]
pub trait LevelStore: Send + Sync {
    /// Create the row with counter = 1 on first message, otherwise add one.
    /// Returns the new counter value.
    async fn increment_counter(
        &self,
        guild_id: u64,
        user_id: u64,
        username: &str,
    ) -> Result<u64, LevelingError>;

    /// Persist the derived level for display queries (leaderboards).
    async fn store_level(
        &self,
        guild_id: u64,
        user_id: u64,
        level: u32,
    ) -> Result<(), LevelingError>;

    /// Current counter, or None if the user never wrote a message.
    async fn get_counter(&self, guild_id: u64, user_id: u64)
        -> Result<Option<u64>, LevelingError>;

    /// Top members of a guild ordered by counter, highest first.
    async fn top_members(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError>;
}

// ============================================================================
// PURE LEVEL MATH
// ============================================================================

/// `level(counter) = floor(sqrt(counter))` for counter >= 1, else 0.
pub fn level_for(counter: u64) -> u32 {
    integer_sqrt(counter) as u32
}

/// Progress within the current level, in [0, 1].
///
/// With thresholds `lo = level^2` and `hi = (level + 1)^2`, progress is
/// `(counter - lo) / (hi - lo)` clamped to [0, 1]. `hi == lo` cannot happen
/// for a non-negative level but is treated as "done" to keep the function
/// total.
pub fn progress_for(counter: u64) -> f64 {
    let level = level_for(counter) as u64;
    let lo = level * level;
    let hi = (level + 1) * (level + 1);
    if hi == lo {
        return 1.0;
    }
    let fraction = (counter.saturating_sub(lo)) as f64 / (hi - lo) as f64;
    fraction.clamp(0.0, 1.0)
}

/// Messages still needed to reach the next level.
pub fn messages_to_next_level(counter: u64) -> u64 {
    let next = (level_for(counter) as u64 + 1).pow(2);
    next.saturating_sub(counter)
}

fn integer_sqrt(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    // f64 sqrt is only an estimate for large inputs; correct it both ways.
    let mut x = (n as f64).sqrt() as u64;
    while (x + 1).checked_mul(x + 1).is_some_and(|sq| sq <= n) {
        x += 1;
    }
    while x.checked_mul(x).map_or(true, |sq| sq > n) {
        x -= 1;
    }
    x
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct LevelingService<S: LevelStore> {
    store: S,
}

impl<S: LevelStore> LevelingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn validate_ids(user_id: u64, guild_id: u64) -> Result<(), LevelingError> {
        if user_id == 0 || guild_id == 0 {
            Err(LevelingError::InvalidId)
        } else {
            Ok(())
        }
    }

    /// Count one message: bump the counter and persist the derived level.
    pub async fn process_message(
        &self,
        guild_id: u64,
        user_id: u64,
        username: &str,
    ) -> Result<MemberProgress, LevelingError> {
        Self::validate_ids(user_id, guild_id)?;

        let counter = self
            .store
            .increment_counter(guild_id, user_id, username)
            .await?;
        let level = level_for(counter);
        self.store.store_level(guild_id, user_id, level).await?;

        Ok(MemberProgress {
            counter,
            level,
            progress: progress_for(counter),
        })
    }

    /// Current progress for a member, or None if they never wrote anything.
    pub async fn member_progress(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<MemberProgress>, LevelingError> {
        Self::validate_ids(user_id, guild_id)?;

        let Some(counter) = self.store.get_counter(guild_id, user_id).await? else {
            return Ok(None);
        };
        Ok(Some(MemberProgress {
            counter,
            level: level_for(counter),
            progress: progress_for(counter),
        }))
    }

    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError> {
        if guild_id == 0 {
            return Err(LevelingError::InvalidId);
        }
        self.store.top_members(guild_id, limit).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    #[test]
    fn level_matches_floor_sqrt() {
        for counter in 1..=10_000u64 {
            let level = level_for(counter) as u64;
            assert_eq!(level, (counter as f64).sqrt().floor() as u64);
            assert!(level * level <= counter);
            assert!(counter < (level + 1) * (level + 1));
        }
    }

    #[test]
    fn level_of_zero_is_zero() {
        assert_eq!(level_for(0), 0);
    }

    #[test]
    fn ten_messages_is_level_three_one_seventh_in() {
        // 3^2 = 9 <= 10 < 16 = 4^2, progress = (10 - 9) / (16 - 9).
        assert_eq!(level_for(10), 3);
        let progress = progress_for(10);
        assert!((progress - 1.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn progress_is_zero_at_threshold_and_near_one_below_next() {
        for level in 1u64..50 {
            let lo = level * level;
            let hi = (level + 1) * (level + 1);
            assert_eq!(progress_for(lo), 0.0);
            let near_top = progress_for(hi - 1);
            assert!(near_top > 0.8 && near_top <= 1.0);
        }
    }

    #[test]
    fn progress_always_in_unit_interval() {
        for counter in 0..=5_000u64 {
            let p = progress_for(counter);
            assert!((0.0..=1.0).contains(&p), "progress({counter}) = {p}");
        }
    }

    #[test]
    fn large_counters_do_not_overflow() {
        let level = level_for(u64::MAX) as u64;
        assert!(level * level <= u64::MAX);
    }

    /// In-memory fake so service flow can be tested without a database.
    struct MemoryLevelStore {
        counters: DashMap<(u64, u64), (u64, u32)>,
    }

    impl MemoryLevelStore {
        fn new() -> Self {
            Self {
                counters: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl LevelStore for MemoryLevelStore {
        async fn increment_counter(
            &self,
            guild_id: u64,
            user_id: u64,
            _username: &str,
        ) -> Result<u64, LevelingError> {
            let mut entry = self.counters.entry((guild_id, user_id)).or_insert((0, 0));
            entry.0 += 1;
            Ok(entry.0)
        }

        async fn store_level(
            &self,
            guild_id: u64,
            user_id: u64,
            level: u32,
        ) -> Result<(), LevelingError> {
            if let Some(mut entry) = self.counters.get_mut(&(guild_id, user_id)) {
                entry.1 = level;
            }
            Ok(())
        }

        async fn get_counter(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<u64>, LevelingError> {
            Ok(self.counters.get(&(guild_id, user_id)).map(|e| e.0))
        }

        async fn top_members(
            &self,
            guild_id: u64,
            limit: usize,
        ) -> Result<Vec<MemberRecord>, LevelingError> {
            let mut members: Vec<MemberRecord> = self
                .counters
                .iter()
                .filter(|e| e.key().0 == guild_id)
                .map(|e| MemberRecord {
                    user_id: e.key().1,
                    guild_id,
                    username: String::new(),
                    counter: e.value().0,
                    level: e.value().1,
                })
                .collect();
            members.sort_by(|a, b| b.counter.cmp(&a.counter));
            members.truncate(limit);
            Ok(members)
        }
    }

    #[tokio::test]
    async fn counting_messages_advances_level() {
        let service = LevelingService::new(MemoryLevelStore::new());

        let mut last = None;
        for _ in 0..10 {
            last = Some(service.process_message(1, 42, "tester").await.unwrap());
        }
        let progress = last.unwrap();
        assert_eq!(progress.counter, 10);
        assert_eq!(progress.level, 3);

        let stored = service.member_progress(1, 42).await.unwrap().unwrap();
        assert_eq!(stored.counter, 10);
    }

    #[tokio::test]
    async fn unknown_member_has_no_progress() {
        let service = LevelingService::new(MemoryLevelStore::new());
        assert!(service.member_progress(1, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaderboard_orders_by_counter() {
        let service = LevelingService::new(MemoryLevelStore::new());
        for _ in 0..5 {
            service.process_message(1, 1, "a").await.unwrap();
        }
        for _ in 0..9 {
            service.process_message(1, 2, "b").await.unwrap();
        }
        service.process_message(2, 3, "other-guild").await.unwrap();

        let top = service.leaderboard(1, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 2);
        assert_eq!(top[1].user_id, 1);
    }

    #[tokio::test]
    async fn zero_ids_are_rejected() {
        let service = LevelingService::new(MemoryLevelStore::new());
        assert!(matches!(
            service.process_message(0, 1, "x").await,
            Err(LevelingError::InvalidId)
        ));
    }
}
