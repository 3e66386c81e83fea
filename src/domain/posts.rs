//! Post summaries and popularity categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of a popularity listing.
///
/// Produced by the durable store or decoded from a cached blob. Never
/// mutated in place: updates replace the cached copy wholesale or patch a
/// single entry inside a blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: OffsetDateTime,
    /// `None` for anonymous posts.
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub weekly: bool,
    pub legend: bool,
    pub notice: bool,
}

/// A popularity bucket whose listing is independently cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Weekly,
    Legend,
    Notice,
    Realtime,
    FirstPage,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Weekly,
        Category::Legend,
        Category::Notice,
        Category::Realtime,
        Category::FirstPage,
    ];

    /// Stable wire name, used as the cache key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Weekly => "weekly",
            Category::Legend => "legend",
            Category::Notice => "notice",
            Category::Realtime => "realtime",
            Category::FirstPage => "first_page",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown category `{0}`")]
pub struct UnknownCategory(String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}
