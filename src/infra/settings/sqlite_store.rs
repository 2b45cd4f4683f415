use crate::core::settings::{
    BumpReminderTarget, ChannelKind, GuildSettings, RoleKind, SettingsError, SettingsStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub async fn new(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER PRIMARY KEY,
                prefix TEXT,
                birthday_channel_id INTEGER,
                sanction_channel_id INTEGER,
                welcome_channel_id INTEGER,
                bump_reminder_channel_id INTEGER,
                fact_channel_id INTEGER,
                dynamic_voice_channel_id INTEGER,
                bumper_role_id INTEGER,
                quiz_reward_role_id INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS web_users (
                user_id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                first_login TEXT NOT NULL,
                last_login TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn read_optional_id(row: &sqlx::sqlite::SqliteRow, column: &str) -> Option<u64> {
        row.get::<Option<i64>, _>(column).map(|v| v as u64)
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, guild_id: u64) -> Result<GuildSettings, SettingsError> {
        let row = sqlx::query("SELECT * FROM guild_settings WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SettingsError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(GuildSettings::default());
        };

        Ok(GuildSettings {
            prefix: row.get("prefix"),
            birthday_channel: Self::read_optional_id(&row, "birthday_channel_id"),
            sanctions_channel: Self::read_optional_id(&row, "sanction_channel_id"),
            welcome_channel: Self::read_optional_id(&row, "welcome_channel_id"),
            bump_reminder_channel: Self::read_optional_id(&row, "bump_reminder_channel_id"),
            fact_channel: Self::read_optional_id(&row, "fact_channel_id"),
            dynamic_voice_channel: Self::read_optional_id(&row, "dynamic_voice_channel_id"),
            bumper_role: Self::read_optional_id(&row, "bumper_role_id"),
            quiz_reward_role: Self::read_optional_id(&row, "quiz_reward_role_id"),
        })
    }

    async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, prefix)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET prefix = excluded.prefix
            "#,
        )
        .bind(guild_id as i64)
        .bind(prefix)
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn set_channel(
        &self,
        guild_id: u64,
        kind: ChannelKind,
        channel_id: Option<u64>,
    ) -> Result<(), SettingsError> {
        // Column names come from a closed enum, not user input.
        let column = kind.column();
        let sql = format!(
            "INSERT INTO guild_settings (guild_id, {column}) VALUES (?, ?) \
             ON CONFLICT(guild_id) DO UPDATE SET {column} = excluded.{column}"
        );
        sqlx::query(&sql)
            .bind(guild_id as i64)
            .bind(channel_id.map(|id| id as i64))
            .execute(&self.pool)
            .await
            .map_err(|e| SettingsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn set_role(
        &self,
        guild_id: u64,
        kind: RoleKind,
        role_id: Option<u64>,
    ) -> Result<(), SettingsError> {
        let column = kind.column();
        let sql = format!(
            "INSERT INTO guild_settings (guild_id, {column}) VALUES (?, ?) \
             ON CONFLICT(guild_id) DO UPDATE SET {column} = excluded.{column}"
        );
        sqlx::query(&sql)
            .bind(guild_id as i64)
            .bind(role_id.map(|id| id as i64))
            .execute(&self.pool)
            .await
            .map_err(|e| SettingsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn bump_reminder_targets(&self) -> Result<Vec<BumpReminderTarget>, SettingsError> {
        let rows = sqlx::query(
            "SELECT guild_id, bump_reminder_channel_id, bumper_role_id \
             FROM guild_settings WHERE bump_reminder_channel_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SettingsError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| BumpReminderTarget {
                guild_id: r.get::<i64, _>("guild_id") as u64,
                channel_id: r.get::<i64, _>("bump_reminder_channel_id") as u64,
                bumper_role: Self::read_optional_id(r, "bumper_role_id"),
            })
            .collect())
    }

    async fn record_web_login(
        &self,
        user_id: u64,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO web_users (user_id, username, first_login, last_login)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                last_login = excluded.last_login
            "#,
        )
        .bind(user_id as i64)
        .bind(username)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::memory_pool;

    async fn store() -> SqliteSettingsStore {
        SqliteSettingsStore::new(memory_pool().await).await.unwrap()
    }

    #[tokio::test]
    async fn missing_guild_reads_as_defaults() {
        let store = store().await;
        assert_eq!(store.get(1).await.unwrap(), GuildSettings::default());
    }

    #[tokio::test]
    async fn setters_upsert_independent_columns() {
        let store = store().await;
        store.set_prefix(1, "?").await.unwrap();
        store
            .set_channel(1, ChannelKind::Birthday, Some(100))
            .await
            .unwrap();
        store.set_role(1, RoleKind::Bumper, Some(200)).await.unwrap();

        let settings = store.get(1).await.unwrap();
        assert_eq!(settings.prefix.as_deref(), Some("?"));
        assert_eq!(settings.birthday_channel, Some(100));
        assert_eq!(settings.bumper_role, Some(200));
        assert_eq!(settings.welcome_channel, None);

        store.set_channel(1, ChannelKind::Birthday, None).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().birthday_channel, None);
    }

    #[tokio::test]
    async fn reminder_targets_require_a_channel() {
        let store = store().await;
        store
            .set_channel(1, ChannelKind::BumpReminder, Some(10))
            .await
            .unwrap();
        store.set_role(1, RoleKind::Bumper, Some(20)).await.unwrap();
        store.set_prefix(2, "!").await.unwrap();

        let targets = store.bump_reminder_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(
            targets[0],
            BumpReminderTarget {
                guild_id: 1,
                channel_id: 10,
                bumper_role: Some(20),
            }
        );
    }

    #[tokio::test]
    async fn web_login_keeps_first_login_and_updates_last() {
        let store = store().await;
        let first = Utc::now();
        let later = first + chrono::Duration::days(1);
        store.record_web_login(42, "old", first).await.unwrap();
        store.record_web_login(42, "new", later).await.unwrap();

        let row = sqlx::query("SELECT username, first_login, last_login FROM web_users")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("username"), "new");
        assert_eq!(row.get::<DateTime<Utc>, _>("first_login"), first);
        assert_eq!(row.get::<DateTime<Utc>, _>("last_login"), later);
    }
}
