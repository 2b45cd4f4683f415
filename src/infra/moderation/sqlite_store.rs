use crate::core::moderation::{ModerationError, ModerationStore, WarnRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

impl SqliteModerationStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        // Append-only sanction logs. Rows are never updated or deleted.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                warned_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                minutes INTEGER NOT NULL,
                reason TEXT NOT NULL,
                issued_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                banned_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn add_warn(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        sqlx::query("INSERT INTO warns (guild_id, user_id, reason, warned_at) VALUES (?, ?, ?, ?)")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .bind(reason)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn warns_since(
        &self,
        guild_id: u64,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<WarnRecord>, ModerationError> {
        let rows = sqlx::query(
            "SELECT reason, warned_at FROM warns \
             WHERE guild_id = ? AND user_id = ? AND warned_at > ? \
             ORDER BY warned_at ASC",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| WarnRecord {
                user_id,
                guild_id,
                reason: r.get("reason"),
                at: r.get("warned_at"),
            })
            .collect())
    }

    async fn add_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        minutes: u32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        sqlx::query(
            "INSERT INTO timeouts (guild_id, user_id, minutes, reason, issued_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(minutes as i64)
        .bind(reason)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn add_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        sqlx::query("INSERT INTO bans (guild_id, user_id, reason, banned_at) VALUES (?, ?, ?, ?)")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .bind(reason)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;
    use chrono::Duration;

    async fn store() -> SqliteModerationStore {
        SqliteModerationStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn warns_accumulate_and_window() {
        let store = store().await;
        let now = Utc::now();
        store
            .add_warn(1, 42, "old", now - Duration::hours(30))
            .await
            .unwrap();
        store.add_warn(1, 42, "recent", now).await.unwrap();

        let recent = store
            .warns_since(1, 42, now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].reason, "recent");

        let all = store
            .warns_since(1, 42, now - Duration::days(365))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].reason, "old");
    }

    #[tokio::test]
    async fn timeouts_and_bans_insert_without_error() {
        let store = store().await;
        let now = Utc::now();
        store.add_timeout(1, 42, 1440, "spam", now).await.unwrap();
        store.add_ban(1, 42, "repeat offender", now).await.unwrap();
    }

    #[tokio::test]
    async fn warns_are_scoped_per_user_and_guild() {
        let store = store().await;
        let now = Utc::now();
        store.add_warn(1, 42, "a", now).await.unwrap();
        store.add_warn(1, 7, "b", now).await.unwrap();
        store.add_warn(2, 42, "c", now).await.unwrap();

        let warns = store
            .warns_since(1, 42, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].reason, "a");
    }
}
