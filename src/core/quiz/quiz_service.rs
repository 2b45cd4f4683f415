// Ten-question multiple-choice IT quiz. The question pool is fixed in
// code; only the latest result per (guild, user) is persisted.

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use thiserror::Error;

/// Questions per quiz run.
pub const QUIZ_LENGTH: usize = 10;

/// Scores at or above this earn the reward role (when one is configured).
pub const REWARD_THRESHOLD: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct QuizQuestion {
    pub question: &'static str,
    pub options: [&'static str; 4],
    /// Index into `options`.
    pub answer: usize,
}

pub const QUESTIONS: [QuizQuestion; 10] = [
    QuizQuestion {
        question: "What does HTML stand for?",
        options: [
            "Hyper Text Markup Language",
            "High Text Machine Learning",
            "Hyper Transfer Main Logic",
            "Home Tool Management Level",
        ],
        answer: 0,
    },
    QuizQuestion {
        question: "Which language runs natively in the browser?",
        options: ["Python", "C#", "JavaScript", "Rust"],
        answer: 2,
    },
    QuizQuestion {
        question: "What is a database?",
        options: [
            "A website",
            "A store for structured data",
            "A text document",
            "A web server",
        ],
        answer: 1,
    },
    QuizQuestion {
        question: "What is Git?",
        options: [
            "A text editor",
            "A version control system",
            "An operating system",
            "A web browser",
        ],
        answer: 1,
    },
    QuizQuestion {
        question: "Which language dominates machine learning?",
        options: ["Java", "Python", "C++", "Ruby"],
        answer: 1,
    },
    QuizQuestion {
        question: "What does API stand for?",
        options: [
            "Application Programming Interface",
            "Automated Process Integration",
            "Advanced Programming Instruction",
            "Application Performance Index",
        ],
        answer: 0,
    },
    QuizQuestion {
        question: "Which of these is not a frontend framework?",
        options: ["React", "Angular", "Django", "Vue.js"],
        answer: 2,
    },
    QuizQuestion {
        question: "What does CSS do?",
        options: [
            "Structures content",
            "Styles web pages",
            "Programs logic",
            "Connects databases",
        ],
        answer: 1,
    },
    QuizQuestion {
        question: "What is Docker?",
        options: [
            "A cloud service",
            "A containerization platform",
            "A database management system",
            "A text editor",
        ],
        answer: 1,
    },
    QuizQuestion {
        question: "Which language is primarily used for iOS development?",
        options: ["Swift", "Kotlin", "JavaScript", "C#"],
        answer: 0,
    },
];

/// Sample up to `count` distinct questions in random order.
pub fn sample_questions(count: usize) -> Vec<QuizQuestion> {
    let mut rng = rand::thread_rng();
    let mut picked: Vec<QuizQuestion> = QUESTIONS.to_vec();
    picked.shuffle(&mut rng);
    picked.truncate(count.min(QUESTIONS.len()));
    picked
}

/// Whether a finished run earns the reward role.
pub fn reward_earned(score: u32) -> bool {
    score >= REWARD_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub score: u32,
    pub date_played: NaiveDate,
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Overwrite the member's result; history is not preserved.
    async fn save_result(
        &self,
        guild_id: u64,
        user_id: u64,
        result: QuizResult,
    ) -> Result<(), QuizError>;

    async fn last_result(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<QuizResult>, QuizError>;
}

pub struct QuizService<S: QuizStore> {
    store: S,
}

impl<S: QuizStore> QuizService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn save_score(
        &self,
        guild_id: u64,
        user_id: u64,
        score: u32,
        date_played: NaiveDate,
    ) -> Result<(), QuizError> {
        self.store
            .save_result(guild_id, user_id, QuizResult { score, date_played })
            .await
    }

    pub async fn last_score(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<QuizResult>, QuizError> {
        self.store.last_result(guild_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    #[test]
    fn every_answer_index_is_valid() {
        for q in &QUESTIONS {
            assert!(q.answer < q.options.len(), "bad answer index in {:?}", q.question);
        }
    }

    #[test]
    fn sampling_yields_distinct_questions() {
        let sampled = sample_questions(QUIZ_LENGTH);
        assert_eq!(sampled.len(), QUIZ_LENGTH);
        let mut texts: Vec<&str> = sampled.iter().map(|q| q.question).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), QUIZ_LENGTH);
    }

    #[test]
    fn sampling_caps_at_pool_size() {
        assert_eq!(sample_questions(100).len(), QUESTIONS.len());
    }

    #[test]
    fn reward_threshold() {
        assert!(!reward_earned(7));
        assert!(reward_earned(8));
        assert!(reward_earned(10));
    }

    struct MemoryQuizStore {
        results: DashMap<(u64, u64), QuizResult>,
    }

    #[async_trait]
    impl QuizStore for MemoryQuizStore {
        async fn save_result(
            &self,
            guild_id: u64,
            user_id: u64,
            result: QuizResult,
        ) -> Result<(), QuizError> {
            self.results.insert((guild_id, user_id), result);
            Ok(())
        }

        async fn last_result(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<QuizResult>, QuizError> {
            Ok(self.results.get(&(guild_id, user_id)).map(|r| r.clone()))
        }
    }

    #[tokio::test]
    async fn result_is_overwritten_per_play() {
        let service = QuizService::new(MemoryQuizStore {
            results: DashMap::new(),
        });
        let day1 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();

        service.save_score(1, 42, 6, day1).await.unwrap();
        service.save_score(1, 42, 9, day2).await.unwrap();

        let latest = service.last_score(1, 42).await.unwrap().unwrap();
        assert_eq!(latest.score, 9);
        assert_eq!(latest.date_played, day2);
    }
}
