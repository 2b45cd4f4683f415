use crate::core::custom_commands::{CommandStore, CustomCommand, CustomCommandError};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteCommandStore {
    pool: Pool<Sqlite>,
}

impl SqliteCommandStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS custom_commands (
                guild_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                response TEXT NOT NULL,
                PRIMARY KEY (guild_id, name)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CommandStore for SqliteCommandStore {
    async fn upsert(
        &self,
        guild_id: u64,
        name: &str,
        response: &str,
    ) -> Result<(), CustomCommandError> {
        sqlx::query(
            r#"
            INSERT INTO custom_commands (guild_id, name, response)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, name) DO UPDATE SET response = excluded.response
            "#,
        )
        .bind(guild_id as i64)
        .bind(name)
        .bind(response)
        .execute(&self.pool)
        .await
        .map_err(|e| CustomCommandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, guild_id: u64, name: &str) -> Result<bool, CustomCommandError> {
        let result = sqlx::query("DELETE FROM custom_commands WHERE guild_id = ? AND name = ?")
            .bind(guild_id as i64)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| CustomCommandError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(
        &self,
        guild_id: u64,
        name: &str,
    ) -> Result<Option<CustomCommand>, CustomCommandError> {
        let row = sqlx::query("SELECT response FROM custom_commands WHERE guild_id = ? AND name = ?")
            .bind(guild_id as i64)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CustomCommandError::Storage(e.to_string()))?;

        Ok(row.map(|r| CustomCommand {
            name: name.to_string(),
            response: r.get("response"),
        }))
    }

    async fn list(&self, guild_id: u64) -> Result<Vec<CustomCommand>, CustomCommandError> {
        let rows = sqlx::query(
            "SELECT name, response FROM custom_commands WHERE guild_id = ? ORDER BY name ASC",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CustomCommandError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| CustomCommand {
                name: r.get("name"),
                response: r.get("response"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;

    #[tokio::test]
    async fn upsert_overwrites_and_list_is_sorted() {
        let store = SqliteCommandStore::new(memory_pool().await).await.unwrap();
        store.upsert(1, "zeta", "last").await.unwrap();
        store.upsert(1, "alpha", "first").await.unwrap();
        store.upsert(1, "alpha", "updated").await.unwrap();

        let list = store.list(1).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "alpha");
        assert_eq!(list[0].response, "updated");

        assert!(store.remove(1, "alpha").await.unwrap());
        assert!(!store.remove(1, "alpha").await.unwrap());
        assert!(store.get(1, "alpha").await.unwrap().is_none());
    }
}
