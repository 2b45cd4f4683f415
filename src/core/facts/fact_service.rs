// Daily fact rotation. Facts are posted once per day at a fixed UTC time;
// the least-recently-posted fact goes next, never-posted facts before
// everything else.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use thiserror::Error;

/// UTC hour of the daily fact post.
pub const FACT_HOUR_UTC: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub id: i64,
    pub text: String,
    pub last_posted: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum FactError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Fact text must not be empty")]
    EmptyFact,
}

#[async_trait]
pub trait FactStore: Send + Sync {
    async fn add_fact(&self, text: &str) -> Result<i64, FactError>;

    /// The fact due next: never-posted first, then oldest `last_posted`,
    /// ties broken by lowest id. None when the pool is empty.
    async fn next_fact(&self) -> Result<Option<Fact>, FactError>;

    async fn mark_posted(&self, id: i64, at: DateTime<Utc>) -> Result<(), FactError>;

    async fn count(&self) -> Result<u64, FactError>;
}

/// Next occurrence of [`FACT_HOUR_UTC`] strictly after `now`.
pub fn next_fact_time(now: DateTime<Utc>) -> DateTime<Utc> {
    let today_slot = Utc
        .from_utc_datetime(
            &now.date_naive()
                .and_time(NaiveTime::from_hms_opt(FACT_HOUR_UTC, 0, 0).unwrap_or(NaiveTime::MIN)),
        );
    if today_slot > now {
        today_slot
    } else {
        today_slot + Duration::days(1)
    }
}

pub struct FactService<S: FactStore> {
    store: S,
}

impl<S: FactStore> FactService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn add(&self, text: &str) -> Result<i64, FactError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FactError::EmptyFact);
        }
        self.store.add_fact(text).await
    }

    /// Pop the next fact for posting and stamp it as posted.
    pub async fn take_next(&self, now: DateTime<Utc>) -> Result<Option<Fact>, FactError> {
        let Some(fact) = self.store.next_fact().await? else {
            return Ok(None);
        };
        self.store.mark_posted(fact.id, now).await?;
        Ok(Some(fact))
    }

    pub async fn count(&self) -> Result<u64, FactError> {
        self.store.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Default)]
    struct MemoryFactStore {
        facts: DashMap<i64, Fact>,
        next_id: AtomicI64,
    }

    #[async_trait]
    impl FactStore for MemoryFactStore {
        async fn add_fact(&self, text: &str) -> Result<i64, FactError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.facts.insert(
                id,
                Fact {
                    id,
                    text: text.to_string(),
                    last_posted: None,
                },
            );
            Ok(id)
        }

        async fn next_fact(&self) -> Result<Option<Fact>, FactError> {
            let mut all: Vec<Fact> = self.facts.iter().map(|f| f.clone()).collect();
            all.sort_by(|a, b| match (a.last_posted, b.last_posted) {
                (None, None) => a.id.cmp(&b.id),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
            });
            Ok(all.into_iter().next())
        }

        async fn mark_posted(&self, id: i64, at: DateTime<Utc>) -> Result<(), FactError> {
            if let Some(mut fact) = self.facts.get_mut(&id) {
                fact.last_posted = Some(at);
            }
            Ok(())
        }

        async fn count(&self) -> Result<u64, FactError> {
            Ok(self.facts.len() as u64)
        }
    }

    #[test]
    fn next_slot_is_today_before_the_hour() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(
            next_fact_time(now),
            Utc.with_ymd_and_hms(2026, 3, 5, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_slot_rolls_to_tomorrow_at_or_after_the_hour() {
        let exactly = Utc.with_ymd_and_hms(2026, 3, 5, 20, 0, 0).unwrap();
        assert_eq!(
            next_fact_time(exactly),
            Utc.with_ymd_and_hms(2026, 3, 6, 20, 0, 0).unwrap()
        );
        let after = Utc.with_ymd_and_hms(2026, 3, 5, 23, 59, 0).unwrap();
        assert_eq!(
            next_fact_time(after),
            Utc.with_ymd_and_hms(2026, 3, 6, 20, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn rotation_prefers_never_posted_then_oldest() {
        let service = FactService::new(MemoryFactStore::default());
        let now = Utc::now();
        service.add("first").await.unwrap();
        service.add("second").await.unwrap();

        let a = service.take_next(now).await.unwrap().unwrap();
        assert_eq!(a.text, "first");
        let b = service.take_next(now + Duration::days(1)).await.unwrap().unwrap();
        assert_eq!(b.text, "second");

        // Pool exhausted once; the oldest-posted fact cycles back in.
        let c = service.take_next(now + Duration::days(2)).await.unwrap().unwrap();
        assert_eq!(c.text, "first");
    }

    #[tokio::test]
    async fn empty_pool_yields_none() {
        let service = FactService::new(MemoryFactStore::default());
        assert!(service.take_next(Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_facts_are_rejected() {
        let service = FactService::new(MemoryFactStore::default());
        assert!(matches!(service.add("   ").await, Err(FactError::EmptyFact)));
        service.add("  real fact  ").await.unwrap();
        assert_eq!(service.count().await.unwrap(), 1);
    }
}
