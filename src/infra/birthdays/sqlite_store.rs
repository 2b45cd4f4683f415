use crate::core::birthdays::{BirthdayError, BirthdayRecord, BirthdayStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteBirthdayStore {
    pool: Pool<Sqlite>,
}

impl SqliteBirthdayStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS birthdays (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                birthday TEXT NOT NULL,
                last_congratulated TEXT,
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
impl BirthdayStore for SqliteBirthdayStore {
    async fn set_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<(), BirthdayError> {
        sqlx::query(
            r#"
            INSERT INTO birthdays (user_id, guild_id, birthday, last_congratulated)
            VALUES (?, ?, ?, NULL)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
                birthday = excluded.birthday,
                last_congratulated = NULL
            "#,
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(|e| BirthdayError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn remove_birthday(&self, guild_id: u64, user_id: u64) -> Result<bool, BirthdayError> {
        let result = sqlx::query("DELETE FROM birthdays WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| BirthdayError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<BirthdayRecord>, BirthdayError> {
        let row = sqlx::query(
            "SELECT birthday, last_congratulated FROM birthdays \
             WHERE user_id = ? AND guild_id = ?",
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BirthdayError::Storage(e.to_string()))?;

        Ok(row.map(|r| BirthdayRecord {
            user_id,
            guild_id,
            date: r.get("birthday"),
            last_congratulated: r.get("last_congratulated"),
        }))
    }

    async fn due_birthdays(
        &self,
        month: u32,
        day: u32,
        today: NaiveDate,
    ) -> Result<Vec<BirthdayRecord>, BirthdayError> {
        // Stored dates are ISO (YYYY-MM-DD); month/day live at fixed offsets.
        let rows = sqlx::query(
            r#"
            SELECT user_id, guild_id, birthday, last_congratulated FROM birthdays
            WHERE CAST(strftime('%m', birthday) AS INTEGER) = ?
              AND CAST(strftime('%d', birthday) AS INTEGER) = ?
              AND (last_congratulated IS NULL OR last_congratulated != ?)
            "#,
        )
        .bind(month as i64)
        .bind(day as i64)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BirthdayError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| BirthdayRecord {
                user_id: r.get::<i64, _>("user_id") as u64,
                guild_id: r.get::<i64, _>("guild_id") as u64,
                date: r.get("birthday"),
                last_congratulated: r.get("last_congratulated"),
            })
            .collect())
    }

    async fn mark_congratulated(
        &self,
        guild_id: u64,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<(), BirthdayError> {
        sqlx::query(
            "UPDATE birthdays SET last_congratulated = ? WHERE user_id = ? AND guild_id = ?",
        )
        .bind(date)
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| BirthdayError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;

    async fn store() -> SqliteBirthdayStore {
        SqliteBirthdayStore::new(memory_pool().await).await.unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let store = store().await;
        store.set_birthday(1, 42, date(1990, 8, 24)).await.unwrap();

        let record = store.get_birthday(1, 42).await.unwrap().unwrap();
        assert_eq!(record.date, date(1990, 8, 24));
        assert_eq!(record.last_congratulated, None);

        assert!(store.remove_birthday(1, 42).await.unwrap());
        assert!(!store.remove_birthday(1, 42).await.unwrap());
        assert!(store.get_birthday(1, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn due_query_filters_by_month_day_and_congratulation() {
        let store = store().await;
        store.set_birthday(1, 1, date(1990, 8, 24)).await.unwrap();
        store.set_birthday(2, 2, date(1985, 8, 24)).await.unwrap();
        store.set_birthday(1, 3, date(1970, 12, 24)).await.unwrap();

        let today = date(2026, 8, 24);
        let due = store.due_birthdays(8, 24, today).await.unwrap();
        assert_eq!(due.len(), 2);

        store.mark_congratulated(1, 1, today).await.unwrap();
        let due = store.due_birthdays(8, 24, today).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, 2);

        // A later year makes the marked record due again.
        let due = store.due_birthdays(8, 24, date(2027, 8, 24)).await.unwrap();
        assert_eq!(due.len(), 2);
    }

    #[tokio::test]
    async fn updating_a_birthday_resets_the_congratulation_marker() {
        let store = store().await;
        store.set_birthday(1, 42, date(1990, 8, 24)).await.unwrap();
        store.mark_congratulated(1, 42, date(2026, 8, 24)).await.unwrap();

        store.set_birthday(1, 42, date(1990, 8, 25)).await.unwrap();
        let record = store.get_birthday(1, 42).await.unwrap().unwrap();
        assert_eq!(record.last_congratulated, None);
    }
}
