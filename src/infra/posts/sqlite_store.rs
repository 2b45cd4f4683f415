use crate::core::posts::{Post, PostChannels, PostError, PostStatus, PostStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqlitePostStore {
    pool: Pool<Sqlite>,
}

impl SqlitePostStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                submitted_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_post_channels (
                guild_id INTEGER PRIMARY KEY,
                review_channel_id INTEGER,
                publish_channel_id INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post, PostError> {
        let status_str: String = row.get("status");
        let status = PostStatus::parse(&status_str)
            .ok_or_else(|| PostError::Storage(format!("unknown post status '{status_str}'")))?;
        Ok(Post {
            id: row.get("id"),
            guild_id: row.get::<i64, _>("guild_id") as u64,
            author_id: row.get::<i64, _>("author_id") as u64,
            content: row.get("content"),
            status,
            submitted_at: row.get("submitted_at"),
        })
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn add_post(
        &self,
        guild_id: u64,
        author_id: u64,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, PostError> {
        let row = sqlx::query(
            r#"
            INSERT INTO posts (guild_id, author_id, content, status, submitted_at)
            VALUES (?, ?, ?, 'pending', ?)
            RETURNING id
            "#,
        )
        .bind(guild_id as i64)
        .bind(author_id as i64)
        .bind(content)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PostError::Storage(e.to_string()))?;

        Ok(row.get(0))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, PostError> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PostError::Storage(e.to_string()))?;

        row.map(|r| Self::row_to_post(&r)).transpose()
    }

    async fn set_status(&self, id: i64, status: PostStatus) -> Result<(), PostError> {
        sqlx::query("UPDATE posts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PostError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn pending_posts(&self, guild_id: u64) -> Result<Vec<Post>, PostError> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE guild_id = ? AND status = 'pending' ORDER BY id ASC",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PostError::Storage(e.to_string()))?;

        rows.iter().map(Self::row_to_post).collect()
    }

    async fn channels(&self, guild_id: u64) -> Result<PostChannels, PostError> {
        let row = sqlx::query(
            "SELECT review_channel_id, publish_channel_id FROM guild_post_channels \
             WHERE guild_id = ?",
        )
        .bind(guild_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PostError::Storage(e.to_string()))?;

        Ok(row
            .map(|r| PostChannels {
                review_channel: r.get::<Option<i64>, _>("review_channel_id").map(|v| v as u64),
                publish_channel: r
                    .get::<Option<i64>, _>("publish_channel_id")
                    .map(|v| v as u64),
            })
            .unwrap_or_default())
    }

    async fn set_channels(&self, guild_id: u64, channels: PostChannels) -> Result<(), PostError> {
        sqlx::query(
            r#"
            INSERT INTO guild_post_channels (guild_id, review_channel_id, publish_channel_id)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                review_channel_id = excluded.review_channel_id,
                publish_channel_id = excluded.publish_channel_id
            "#,
        )
        .bind(guild_id as i64)
        .bind(channels.review_channel.map(|v| v as i64))
        .bind(channels.publish_channel.map(|v| v as i64))
        .execute(&self.pool)
        .await
        .map_err(|e| PostError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;

    async fn store() -> SqlitePostStore {
        SqlitePostStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn posts_insert_pending_and_move_through_statuses() {
        let store = store().await;
        let id = store.add_post(1, 42, "hello", Utc::now()).await.unwrap();

        let post = store.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Pending);
        assert_eq!(post.content, "hello");

        store.set_status(id, PostStatus::Approved).await.unwrap();
        let post = store.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Approved);
        assert!(store.pending_posts(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_queue_is_ordered_and_scoped() {
        let store = store().await;
        let first = store.add_post(1, 42, "a", Utc::now()).await.unwrap();
        let second = store.add_post(1, 42, "b", Utc::now()).await.unwrap();
        store.add_post(2, 42, "other guild", Utc::now()).await.unwrap();

        let pending = store.pending_posts(1).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[1].id, second);
    }

    #[tokio::test]
    async fn channels_default_then_upsert() {
        let store = store().await;
        assert_eq!(store.channels(1).await.unwrap(), PostChannels::default());

        let channels = PostChannels {
            review_channel: Some(10),
            publish_channel: Some(20),
        };
        store.set_channels(1, channels).await.unwrap();
        assert_eq!(store.channels(1).await.unwrap(), channels);
    }
}
