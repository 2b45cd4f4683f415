use crate::core::activity::{
    ActivityError, ActivityStore, ChannelUsage, CommandUsage, GuildPeaks,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteActivityStore {
    pool: Pool<Sqlite>,
}

impl SqliteActivityStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_peaks (
                guild_id INTEGER PRIMARY KEY,
                max_active_users INTEGER NOT NULL DEFAULT 0,
                max_members INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                logged_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_channel_activity_guild_time \
             ON channel_activity (guild_id, logged_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS command_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                command TEXT NOT NULL,
                used_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn record_active_users(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
        sqlx::query(
            r#"
            INSERT INTO guild_peaks (guild_id, max_active_users)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                max_active_users = MAX(max_active_users, excluded.max_active_users)
            "#,
        )
        .bind(guild_id as i64)
        .bind(count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_member_count(&self, guild_id: u64, count: u32) -> Result<(), ActivityError> {
        sqlx::query(
            r#"
            INSERT INTO guild_peaks (guild_id, max_members)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                max_members = MAX(max_members, excluded.max_members)
            "#,
        )
        .bind(guild_id as i64)
        .bind(count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn peaks(&self, guild_id: u64) -> Result<GuildPeaks, ActivityError> {
        let row = sqlx::query(
            "SELECT max_active_users, max_members FROM guild_peaks WHERE guild_id = ?",
        )
        .bind(guild_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;

        Ok(row
            .map(|r| GuildPeaks {
                max_active_users: r.get::<i64, _>("max_active_users") as u32,
                max_members: r.get::<i64, _>("max_members") as u32,
            })
            .unwrap_or_default())
    }

    async fn log_channel_message(
        &self,
        guild_id: u64,
        channel_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        sqlx::query(
            "INSERT INTO channel_activity (guild_id, channel_id, logged_at) VALUES (?, ?, ?)",
        )
        .bind(guild_id as i64)
        .bind(channel_id as i64)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn top_channels(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelUsage>, ActivityError> {
        let rows = sqlx::query(
            "SELECT channel_id, COUNT(*) AS messages FROM channel_activity \
             WHERE guild_id = ? AND logged_at > ? \
             GROUP BY channel_id ORDER BY messages DESC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| ChannelUsage {
                channel_id: r.get::<i64, _>("channel_id") as u64,
                messages: r.get::<i64, _>("messages") as u64,
            })
            .collect())
    }

    async fn log_command_use(
        &self,
        guild_id: u64,
        command: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        sqlx::query("INSERT INTO command_usage (guild_id, command, used_at) VALUES (?, ?, ?)")
            .bind(guild_id as i64)
            .bind(command)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| ActivityError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn top_commands(
        &self,
        guild_id: u64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommandUsage>, ActivityError> {
        let rows = sqlx::query(
            "SELECT command, COUNT(*) AS uses FROM command_usage \
             WHERE guild_id = ? AND used_at > ? \
             GROUP BY command ORDER BY uses DESC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ActivityError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| CommandUsage {
                command: r.get("command"),
                uses: r.get::<i64, _>("uses") as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;
    use chrono::Duration;

    async fn store() -> SqliteActivityStore {
        SqliteActivityStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn peaks_never_shrink() {
        let store = store().await;
        store.record_active_users(1, 12).await.unwrap();
        store.record_active_users(1, 5).await.unwrap();
        store.record_member_count(1, 300).await.unwrap();
        store.record_member_count(1, 250).await.unwrap();

        let peaks = store.peaks(1).await.unwrap();
        assert_eq!(peaks.max_active_users, 12);
        assert_eq!(peaks.max_members, 300);
        assert_eq!(store.peaks(2).await.unwrap(), GuildPeaks::default());
    }

    #[tokio::test]
    async fn channel_aggregation_windows_and_sorts() {
        let store = store().await;
        let now = Utc::now();
        for _ in 0..3 {
            store.log_channel_message(1, 10, now).await.unwrap();
        }
        store.log_channel_message(1, 20, now).await.unwrap();
        store
            .log_channel_message(1, 20, now - Duration::days(40))
            .await
            .unwrap();

        let top = store
            .top_channels(1, now - Duration::days(30), 5)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].channel_id, 10);
        assert_eq!(top[0].messages, 3);
    }

    #[tokio::test]
    async fn command_aggregation_counts_per_name() {
        let store = store().await;
        let now = Utc::now();
        for cmd in ["bump", "bump", "rank"] {
            store.log_command_use(1, cmd, now).await.unwrap();
        }
        let top = store
            .top_commands(1, now - Duration::hours(1), 5)
            .await
            .unwrap();
        assert_eq!(top[0].command, "bump");
        assert_eq!(top[0].uses, 2);
    }
}
