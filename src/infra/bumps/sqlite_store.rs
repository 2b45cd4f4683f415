use crate::core::bumps::{BumpError, BumpState, BumpStore, BumperTally};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteBumpStore {
    pool: Pool<Sqlite>,
}

impl SqliteBumpStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bumps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                bumped_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bump_totals (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bump_state (
                guild_id INTEGER PRIMARY KEY,
                last_bump TEXT NOT NULL,
                reminder_sent BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BumpStore for SqliteBumpStore {
    async fn log_bump(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), BumpError> {
        sqlx::query("INSERT INTO bumps (guild_id, user_id, bumped_at) VALUES (?, ?, ?)")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| BumpError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn increment_total(&self, guild_id: u64, user_id: u64) -> Result<(), BumpError> {
        sqlx::query(
            r#"
            INSERT INTO bump_totals (guild_id, user_id, total)
            VALUES (?, ?, 1)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET total = total + 1
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| BumpError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_state(&self, guild_id: u64, at: DateTime<Utc>) -> Result<(), BumpError> {
        sqlx::query(
            r#"
            INSERT INTO bump_state (guild_id, last_bump, reminder_sent)
            VALUES (?, ?, 0)
            ON CONFLICT(guild_id) DO UPDATE SET
                last_bump = excluded.last_bump,
                reminder_sent = 0
            "#,
        )
        .bind(guild_id as i64)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| BumpError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_state(&self, guild_id: u64) -> Result<Option<BumpState>, BumpError> {
        let row = sqlx::query("SELECT last_bump, reminder_sent FROM bump_state WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BumpError::Storage(e.to_string()))?;

        Ok(row.map(|r| BumpState {
            last_bump: r.get("last_bump"),
            reminder_sent: r.get("reminder_sent"),
        }))
    }

    async fn mark_reminder_sent(&self, guild_id: u64) -> Result<(), BumpError> {
        sqlx::query("UPDATE bump_state SET reminder_sent = 1 WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| BumpError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn all_states(&self) -> Result<Vec<(u64, BumpState)>, BumpError> {
        let rows = sqlx::query("SELECT guild_id, last_bump, reminder_sent FROM bump_state")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BumpError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| {
                (
                    r.get::<i64, _>("guild_id") as u64,
                    BumpState {
                        last_bump: r.get("last_bump"),
                        reminder_sent: r.get("reminder_sent"),
                    },
                )
            })
            .collect())
    }

    async fn top_bumpers(
        &self,
        guild_id: u64,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<BumperTally>, BumpError> {
        let rows = match since {
            None => {
                sqlx::query(
                    "SELECT user_id, total AS count FROM bump_totals \
                     WHERE guild_id = ? ORDER BY total DESC LIMIT ?",
                )
                .bind(guild_id as i64)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            Some(cutoff) => {
                sqlx::query(
                    "SELECT user_id, COUNT(*) AS count FROM bumps \
                     WHERE guild_id = ? AND bumped_at > ? \
                     GROUP BY user_id ORDER BY count DESC LIMIT ?",
                )
                .bind(guild_id as i64)
                .bind(cutoff)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| BumpError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| BumperTally {
                user_id: r.get::<i64, _>("user_id") as u64,
                count: r.get::<i64, _>("count") as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;
    use chrono::Duration;

    async fn store() -> SqliteBumpStore {
        SqliteBumpStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn state_round_trips_and_clears_reminder_flag() {
        let store = store().await;
        assert!(store.get_state(1).await.unwrap().is_none());

        let at = Utc::now();
        store.record_state(1, at).await.unwrap();
        store.mark_reminder_sent(1).await.unwrap();
        assert!(store.get_state(1).await.unwrap().unwrap().reminder_sent);

        // A new bump restarts the window and clears the flag.
        let later = at + Duration::hours(3);
        store.record_state(1, later).await.unwrap();
        let state = store.get_state(1).await.unwrap().unwrap();
        assert_eq!(state.last_bump, later);
        assert!(!state.reminder_sent);
    }

    #[tokio::test]
    async fn totals_and_windowed_counts_disagree_on_purpose() {
        let store = store().await;
        let old = Utc::now() - Duration::days(60);
        let recent = Utc::now() - Duration::hours(1);

        store.log_bump(1, 10, old).await.unwrap();
        store.increment_total(1, 10).await.unwrap();
        store.log_bump(1, 10, old + Duration::hours(3)).await.unwrap();
        store.increment_total(1, 10).await.unwrap();
        store.log_bump(1, 20, recent).await.unwrap();
        store.increment_total(1, 20).await.unwrap();

        let all_time = store.top_bumpers(1, None, 10).await.unwrap();
        assert_eq!(all_time[0].user_id, 10);
        assert_eq!(all_time[0].count, 2);

        let monthly = store
            .top_bumpers(1, Some(Utc::now() - Duration::days(30)), 10)
            .await
            .unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].user_id, 20);
    }

    #[tokio::test]
    async fn all_states_covers_every_guild() {
        let store = store().await;
        store.record_state(1, Utc::now()).await.unwrap();
        store.record_state(2, Utc::now()).await.unwrap();
        assert_eq!(store.all_states().await.unwrap().len(), 2);
    }
}
