use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use entity::{daily_digest, daily_digest::TopicCategories, email_message};

use crate::error::AppResult;

/// Read/mark access to stored messages, as the pipeline needs it.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages received in `[start, end]` with `is_summarized = false`,
    /// ordered by received time ascending.
    async fn find_unsummarized(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<email_message::Model>>;

    /// Flip `is_summarized` on the given ids. Returns the number of rows
    /// updated.
    async fn mark_summarized(&self, ids: &[String]) -> AppResult<u64>;
}

/// Fields of a digest the orchestrator constructs; the store fills in id and
/// distribution defaults.
#[derive(Debug, Clone)]
pub struct NewDigest {
    pub digest_date: NaiveDate,
    pub content: String,
    pub categories: TopicCategories,
    pub email_count: i32,
    pub email_ids: Vec<String>,
}

#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn find_by_date(&self, date: NaiveDate) -> AppResult<Option<daily_digest::Model>>;

    /// Insert a new digest. Fails with `AppError::Conflict` when a digest for
    /// the same date already exists.
    async fn insert(&self, digest: NewDigest) -> AppResult<daily_digest::Model>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<daily_digest::Model>>;

    /// One-shot transition of the distribution fields.
    async fn mark_distributed(
        &self,
        id: i32,
        recipients: Vec<String>,
    ) -> AppResult<daily_digest::Model>;
}
