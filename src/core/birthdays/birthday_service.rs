// Birthday congratulation logic. The daily task aligns itself to local
// midnight in a fixed civil timezone, then checks once per 24h period
// which stored birthdays fall on today's month/day and have not been
// congratulated today yet.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Civil timezone all birthday math runs in.
pub const BIRTHDAY_TZ: Tz = chrono_tz::Europe::Berlin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayRecord {
    pub user_id: u64,
    pub guild_id: u64,
    pub date: NaiveDate,
    pub last_congratulated: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum BirthdayError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid date format, expected DD.MM.YYYY")]
    InvalidDate,
}

#[async_trait]
pub trait BirthdayStore: Send + Sync {
    /// Insert or overwrite the member's birthday.
    async fn set_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<(), BirthdayError>;

    /// Returns true when a record existed and was deleted.
    async fn remove_birthday(&self, guild_id: u64, user_id: u64) -> Result<bool, BirthdayError>;

    async fn get_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<BirthdayRecord>, BirthdayError>;

    /// Records whose month/day match and whose last_congratulated is not
    /// `today` (NULL counts as never congratulated).
    async fn due_birthdays(
        &self,
        month: u32,
        day: u32,
        today: NaiveDate,
    ) -> Result<Vec<BirthdayRecord>, BirthdayError>;

    async fn mark_congratulated(
        &self,
        guild_id: u64,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<(), BirthdayError>;
}

// ============================================================================
// PURE SCHEDULING MATH
// ============================================================================

/// Next local-midnight instant in [`BIRTHDAY_TZ`], as UTC.
///
/// Midnight of the current local day is always in the past, so the result
/// is tomorrow's midnight. DST gaps are skipped forward.
pub fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_today = now.with_timezone(&BIRTHDAY_TZ).date_naive();
    let mut day = local_today;
    for _ in 0..3 {
        day = day + Days::new(1);
        if let Some(local) = BIRTHDAY_TZ
            .from_local_datetime(&day.and_time(NaiveTime::MIN))
            .earliest()
        {
            let utc = local.with_timezone(&Utc);
            if utc > now {
                return utc;
            }
        }
    }
    // Unreachable for any real timezone; keep the function total.
    now + chrono::Duration::hours(24)
}

/// Parse the user-facing DD.MM.YYYY format.
pub fn parse_birthday(input: &str) -> Result<NaiveDate, BirthdayError> {
    NaiveDate::parse_from_str(input.trim(), "%d.%m.%Y").map_err(|_| BirthdayError::InvalidDate)
}

/// Age turned on this year's birthday.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - birthday.year()
}

/// Where a due record's congratulation goes, if anywhere. A guild without a
/// birthday channel and a member who has left both suppress the message;
/// the record is left unmarked so nothing is recorded as sent.
pub fn congratulation_channel(channel: Option<u64>, member_present: bool) -> Option<u64> {
    match channel {
        Some(channel) if member_present => Some(channel),
        _ => None,
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct BirthdayService<S: BirthdayStore> {
    store: S,
}

impl<S: BirthdayStore> BirthdayService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn set_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<(), BirthdayError> {
        self.store.set_birthday(guild_id, user_id, date).await
    }

    pub async fn remove_birthday(&self, guild_id: u64, user_id: u64) -> Result<bool, BirthdayError> {
        self.store.remove_birthday(guild_id, user_id).await
    }

    pub async fn get_birthday(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<BirthdayRecord>, BirthdayError> {
        self.store.get_birthday(guild_id, user_id).await
    }

    /// Birthdays that still need a congratulation for `today`.
    pub async fn due_today(&self, today: NaiveDate) -> Result<Vec<BirthdayRecord>, BirthdayError> {
        self.store
            .due_birthdays(today.month(), today.day(), today)
            .await
    }

    /// Record that the congratulation went out, making the daily check
    /// idempotent for this record.
    pub async fn mark_congratulated(
        &self,
        guild_id: u64,
        user_id: u64,
        today: NaiveDate,
    ) -> Result<(), BirthdayError> {
        self.store.mark_congratulated(guild_id, user_id, today).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MemoryBirthdayStore {
        records: DashMap<(u64, u64), BirthdayRecord>,
    }

    impl MemoryBirthdayStore {
        fn new() -> Self {
            Self {
                records: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl BirthdayStore for MemoryBirthdayStore {
        async fn set_birthday(
            &self,
            guild_id: u64,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<(), BirthdayError> {
            self.records.insert(
                (guild_id, user_id),
                BirthdayRecord {
                    user_id,
                    guild_id,
                    date,
                    last_congratulated: None,
                },
            );
            Ok(())
        }

        async fn remove_birthday(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<bool, BirthdayError> {
            Ok(self.records.remove(&(guild_id, user_id)).is_some())
        }

        async fn get_birthday(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<BirthdayRecord>, BirthdayError> {
            Ok(self.records.get(&(guild_id, user_id)).map(|r| r.clone()))
        }

        async fn due_birthdays(
            &self,
            month: u32,
            day: u32,
            today: NaiveDate,
        ) -> Result<Vec<BirthdayRecord>, BirthdayError> {
            Ok(self
                .records
                .iter()
                .filter(|r| r.date.month() == month && r.date.day() == day)
                .filter(|r| r.last_congratulated != Some(today))
                .map(|r| r.clone())
                .collect())
        }

        async fn mark_congratulated(
            &self,
            guild_id: u64,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<(), BirthdayError> {
            if let Some(mut record) = self.records.get_mut(&(guild_id, user_id)) {
                record.last_congratulated = Some(date);
            }
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_german_date_format() {
        assert_eq!(parse_birthday("01.04.1998").unwrap(), date(1998, 4, 1));
        assert_eq!(parse_birthday(" 24.12.2000 ").unwrap(), date(2000, 12, 24));
        assert!(parse_birthday("1998-04-01").is_err());
        assert!(parse_birthday("32.01.2000").is_err());
    }

    #[test]
    fn next_midnight_is_local_midnight_in_the_future() {
        // 2024-06-15 10:00 UTC is 12:00 in Berlin (CEST, UTC+2).
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let midnight = next_local_midnight(now);
        assert!(midnight > now);
        let local = midnight.with_timezone(&BIRTHDAY_TZ);
        assert_eq!(local.time(), NaiveTime::MIN);
        assert_eq!(local.date_naive(), date(2024, 6, 16));
        // CEST midnight is 22:00 UTC the previous day.
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 6, 15, 22, 0, 0).unwrap());
    }

    #[test]
    fn next_midnight_shortly_before_midnight_rolls_once() {
        // 23:30 Berlin time: the next midnight is half an hour away.
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 22, 30, 0).unwrap();
        let midnight = next_local_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 1, 10, 23, 0, 0).unwrap());
    }

    #[test]
    fn age_counts_calendar_years() {
        assert_eq!(age_on(date(1998, 4, 1), date(2026, 4, 1)), 28);
    }

    #[test]
    fn congratulations_need_a_channel_and_a_present_member() {
        assert_eq!(congratulation_channel(Some(7), true), Some(7));
        // Departed members are skipped even when a channel is configured.
        assert_eq!(congratulation_channel(Some(7), false), None);
        assert_eq!(congratulation_channel(None, true), None);
        assert_eq!(congratulation_channel(None, false), None);
    }

    #[tokio::test]
    async fn daily_check_is_idempotent_per_day() {
        let service = BirthdayService::new(MemoryBirthdayStore::new());
        service.set_birthday(1, 42, date(1990, 8, 24)).await.unwrap();

        let today = date(2026, 8, 24);
        let due = service.due_today(today).await.unwrap();
        assert_eq!(due.len(), 1);

        service.mark_congratulated(1, 42, today).await.unwrap();
        let due = service.due_today(today).await.unwrap();
        assert!(due.is_empty(), "second run must be a no-op");

        // Next year the record is due again.
        let next_year = date(2027, 8, 24);
        assert_eq!(service.due_today(next_year).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_matching_month_day_are_due() {
        let service = BirthdayService::new(MemoryBirthdayStore::new());
        service.set_birthday(1, 1, date(1990, 8, 24)).await.unwrap();
        service.set_birthday(1, 2, date(1985, 3, 2)).await.unwrap();

        let due = service.due_today(date(2026, 8, 24)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, 1);
    }

    #[tokio::test]
    async fn remove_reports_whether_anything_was_deleted() {
        let service = BirthdayService::new(MemoryBirthdayStore::new());
        assert!(!service.remove_birthday(1, 42).await.unwrap());
        service.set_birthday(1, 42, date(1990, 1, 1)).await.unwrap();
        assert!(service.remove_birthday(1, 42).await.unwrap());
    }
}
