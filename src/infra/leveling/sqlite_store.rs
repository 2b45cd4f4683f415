use crate::core::leveling::{LevelStore, LevelingError, MemberRecord};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteLevelStore {
    pool: Pool<Sqlite>,
}

impl SqliteLevelStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                username TEXT NOT NULL DEFAULT '',
                counter INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, guild_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LevelStore for SqliteLevelStore {
    async fn increment_counter(
        &self,
        guild_id: u64,
        user_id: u64,
        username: &str,
    ) -> Result<u64, LevelingError> {
        // RETURNING makes the read-back part of the same atomic statement.
        let row = sqlx::query(
            r#"
            INSERT INTO users (user_id, guild_id, username, counter)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
                counter = counter + 1,
                username = excluded.username
            RETURNING counter
            "#,
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn store_level(
        &self,
        guild_id: u64,
        user_id: u64,
        level: u32,
    ) -> Result<(), LevelingError> {
        sqlx::query("UPDATE users SET level = ? WHERE user_id = ? AND guild_id = ?")
            .bind(level as i64)
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| LevelingError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_counter(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<u64>, LevelingError> {
        let row = sqlx::query("SELECT counter FROM users WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>(0) as u64))
    }

    async fn top_members(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError> {
        let rows = sqlx::query(
            "SELECT user_id, username, counter, level FROM users \
             WHERE guild_id = ? ORDER BY counter DESC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LevelingError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| MemberRecord {
                user_id: row.get::<i64, _>("user_id") as u64,
                guild_id,
                username: row.get("username"),
                counter: row.get::<i64, _>("counter") as u64,
                level: row.get::<i64, _>("level") as u32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;

    async fn store() -> SqliteLevelStore {
        SqliteLevelStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn increment_creates_then_counts() {
        let store = store().await;
        assert_eq!(store.increment_counter(1, 42, "tester").await.unwrap(), 1);
        assert_eq!(store.increment_counter(1, 42, "tester").await.unwrap(), 2);
        assert_eq!(store.get_counter(1, 42).await.unwrap(), Some(2));
        assert_eq!(store.get_counter(1, 7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn username_follows_latest_message() {
        let store = store().await;
        store.increment_counter(1, 42, "old-name").await.unwrap();
        store.increment_counter(1, 42, "new-name").await.unwrap();
        store.store_level(1, 42, 1).await.unwrap();

        let top = store.top_members(1, 10).await.unwrap();
        assert_eq!(top[0].username, "new-name");
        assert_eq!(top[0].level, 1);
    }

    #[tokio::test]
    async fn top_members_ordered_and_scoped() {
        let store = store().await;
        for _ in 0..3 {
            store.increment_counter(1, 1, "a").await.unwrap();
        }
        store.increment_counter(1, 2, "b").await.unwrap();
        store.increment_counter(2, 3, "c").await.unwrap();

        let top = store.top_members(1, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 1);
        assert_eq!(top[0].counter, 3);
    }
}
