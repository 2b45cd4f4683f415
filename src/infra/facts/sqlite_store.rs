use crate::core::facts::{Fact, FactError, FactStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteFactStore {
    pool: Pool<Sqlite>,
}

impl SqliteFactStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                posted_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FactStore for SqliteFactStore {
    async fn add_fact(&self, text: &str) -> Result<i64, FactError> {
        let row = sqlx::query("INSERT INTO facts (text) VALUES (?) RETURNING id")
            .bind(text)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FactError::Storage(e.to_string()))?;
        Ok(row.get(0))
    }

    async fn next_fact(&self) -> Result<Option<Fact>, FactError> {
        // NULLs sort first: never-posted facts win, then the stalest one.
        let row = sqlx::query(
            "SELECT id, text, posted_at FROM facts \
             ORDER BY posted_at IS NOT NULL, posted_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FactError::Storage(e.to_string()))?;

        Ok(row.map(|r| Fact {
            id: r.get("id"),
            text: r.get("text"),
            last_posted: r.get("posted_at"),
        }))
    }

    async fn mark_posted(&self, id: i64, at: DateTime<Utc>) -> Result<(), FactError> {
        sqlx::query("UPDATE facts SET posted_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FactError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, FactError> {
        let row = sqlx::query("SELECT COUNT(*) FROM facts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FactError::Storage(e.to_string()))?;
        Ok(row.get::<i64, _>(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;
    use chrono::Duration;

    async fn store() -> SqliteFactStore {
        SqliteFactStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn rotation_order_never_posted_then_stalest() {
        let store = store().await;
        let a = store.add_fact("a").await.unwrap();
        let b = store.add_fact("b").await.unwrap();

        let next = store.next_fact().await.unwrap().unwrap();
        assert_eq!(next.id, a);

        let now = Utc::now();
        store.mark_posted(a, now).await.unwrap();
        assert_eq!(store.next_fact().await.unwrap().unwrap().id, b);

        store.mark_posted(b, now + Duration::days(1)).await.unwrap();
        // Both posted: the one posted longest ago comes back first.
        assert_eq!(store.next_fact().await.unwrap().unwrap().id, a);
    }

    #[tokio::test]
    async fn empty_table_and_count() {
        let store = store().await;
        assert!(store.next_fact().await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
        store.add_fact("one").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
