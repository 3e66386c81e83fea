//! External collaborator contracts.
//!
//! The durable store is the relational source of truth behind the cache;
//! it hands back ordered post summaries and is treated as opaque here.
//! Notification delivery is equally external: the featured rebuild only
//! reports newly-featured authors through [`FeaturedNotifier`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::posts::{Category, PostSummary};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Relational source of truth for post summaries.
///
/// Implementations are expected to bound every query with their own
/// timeout; no call from this crate may block a request indefinitely.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Current membership of `category`, best-ranked first, together with
    /// the total member count.
    async fn list_by_category(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<(Vec<PostSummary>, usize), RepoError>;

    /// Summaries for `ids`, in the order given. Unknown ids are skipped.
    async fn list_by_ids_ordered(&self, ids: &[Uuid]) -> Result<Vec<PostSummary>, RepoError>;

    /// Last-resort fallback listing ranked by recency and engagement.
    async fn list_recent_by_engagement(&self, limit: usize)
    -> Result<Vec<PostSummary>, RepoError>;
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery hook for "your post was featured" notifications.
#[async_trait]
pub trait FeaturedNotifier: Send + Sync {
    async fn notify_featured(&self, author_id: Uuid, category: Category)
    -> Result<(), NotifyError>;
}
