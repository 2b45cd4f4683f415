// Member post submissions with a moderation queue. A submission lands as
// Pending, a moderator approves or denies it, and approved posts get
// published to the guild's publish channel. Status never moves back to
// Pending.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Pending,
    Approved,
    Denied,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "approved" => Some(PostStatus::Approved),
            "denied" => Some(PostStatus::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub guild_id: u64,
    pub author_id: u64,
    pub content: String,
    pub status: PostStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Where a guild's post pipeline reads from and writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostChannels {
    pub review_channel: Option<u64>,
    pub publish_channel: Option<u64>,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Post {0} not found")]
    NotFound(i64),

    #[error("Post {0} was already reviewed")]
    AlreadyReviewed(i64),
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a pending post and return its id.
    async fn add_post(
        &self,
        guild_id: u64,
        author_id: u64,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, PostError>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>, PostError>;

    async fn set_status(&self, id: i64, status: PostStatus) -> Result<(), PostError>;

    async fn pending_posts(&self, guild_id: u64) -> Result<Vec<Post>, PostError>;

    async fn channels(&self, guild_id: u64) -> Result<PostChannels, PostError>;

    async fn set_channels(&self, guild_id: u64, channels: PostChannels) -> Result<(), PostError>;
}

pub struct PostService<S: PostStore> {
    store: S,
}

impl<S: PostStore> PostService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        guild_id: u64,
        author_id: u64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, PostError> {
        self.store.add_post(guild_id, author_id, content, now).await
    }

    /// Approve a pending post and return it for publication.
    pub async fn approve(&self, guild_id: u64, id: i64) -> Result<Post, PostError> {
        self.review(guild_id, id, PostStatus::Approved).await
    }

    pub async fn deny(&self, guild_id: u64, id: i64) -> Result<Post, PostError> {
        self.review(guild_id, id, PostStatus::Denied).await
    }

    async fn review(&self, guild_id: u64, id: i64, verdict: PostStatus) -> Result<Post, PostError> {
        let post = self
            .store
            .get_post(id)
            .await?
            .ok_or(PostError::NotFound(id))?;
        // Ids are global but review happens inside one guild. A post from
        // another guild looks like a missing post to the reviewer.
        if post.guild_id != guild_id {
            return Err(PostError::NotFound(id));
        }
        if post.status != PostStatus::Pending {
            return Err(PostError::AlreadyReviewed(id));
        }
        self.store.set_status(id, verdict).await?;
        Ok(Post {
            status: verdict,
            ..post
        })
    }

    pub async fn pending(&self, guild_id: u64) -> Result<Vec<Post>, PostError> {
        self.store.pending_posts(guild_id).await
    }

    pub async fn channels(&self, guild_id: u64) -> Result<PostChannels, PostError> {
        self.store.channels(guild_id).await
    }

    pub async fn set_channels(
        &self,
        guild_id: u64,
        channels: PostChannels,
    ) -> Result<(), PostError> {
        self.store.set_channels(guild_id, channels).await
    }
}
