use crate::core::quiz::{QuizError, QuizResult, QuizStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteQuizStore {
    pool: Pool<Sqlite>,
}

impl SqliteQuizStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        // One row per member, overwritten on every play.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quiz_results (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                date_played TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl QuizStore for SqliteQuizStore {
    async fn save_result(
        &self,
        guild_id: u64,
        user_id: u64,
        result: QuizResult,
    ) -> Result<(), QuizError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_results (guild_id, user_id, score, date_played)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                score = excluded.score,
                date_played = excluded.date_played
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(result.score as i64)
        .bind(result.date_played)
        .execute(&self.pool)
        .await
        .map_err(|e| QuizError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn last_result(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<QuizResult>, QuizError> {
        let row = sqlx::query(
            "SELECT score, date_played FROM quiz_results WHERE guild_id = ? AND user_id = ?",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QuizError::Storage(e.to_string()))?;

        Ok(row.map(|r| QuizResult {
            score: r.get::<i64, _>("score") as u32,
            date_played: r.get("date_played"),
        }))
    }
}
