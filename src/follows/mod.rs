use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{FollowError, FollowResult};

pub mod events;
pub mod handler;
pub mod listing;
pub mod memory;
pub mod repository;
pub mod store;

pub use events::{FollowEvent, FollowObserver, Observers};
pub use memory::{FaultPoint, MemoryFollowRepository};
pub use repository::{FollowRepository, PgFollowRepository};
pub use store::FollowStore;

const MAX_FOLLOW_TYPE_LEN: usize = 32;

/// Namespace of a follow relationship. All kinds share one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FollowType {
    /// User-follows-user, stored as the empty string.
    #[default]
    Default,
    /// User-follows-blog.
    Blogs,
    /// Namespace registered by a third party.
    Custom(String),
}

impl FollowType {
    /// Parses a caller-supplied tag. Accepts `""`, `"blogs"` or a short
    /// lowercase identifier.
    pub fn parse(raw: &str) -> FollowResult<Self> {
        match raw {
            "" => Ok(FollowType::Default),
            "blogs" => Ok(FollowType::Blogs),
            other => {
                let well_formed = other.len() <= MAX_FOLLOW_TYPE_LEN
                    && other.bytes().all(|b| {
                        b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-'
                    });
                if well_formed {
                    Ok(FollowType::Custom(other.to_string()))
                } else {
                    Err(FollowError::invalid(format!("malformed follow type '{}'", other)))
                }
            }
        }
    }

    /// Maps a value read back from storage. Stored values were validated on
    /// the way in.
    pub(crate) fn from_column(raw: String) -> Self {
        match raw.as_str() {
            "" => FollowType::Default,
            "blogs" => FollowType::Blogs,
            _ => FollowType::Custom(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FollowType::Default => "",
            FollowType::Blogs => "blogs",
            FollowType::Custom(tag) => tag,
        }
    }

    /// Noun used in user-facing messages about the leader.
    pub fn leader_noun(&self) -> &'static str {
        match self {
            FollowType::Blogs => "site",
            _ => "user",
        }
    }
}

impl fmt::Display for FollowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for FollowType {
    type Error = FollowError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        FollowType::parse(&raw)
    }
}

impl From<FollowType> for String {
    fn from(follow_type: FollowType) -> Self {
        follow_type.as_str().to_string()
    }
}

/// A single follow relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowRelationship {
    pub leader_id: i64,
    pub follower_id: i64,
    pub follow_type: FollowType,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Database row for the follows table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FollowRow {
    pub leader_id: i64,
    pub follower_id: i64,
    pub follow_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<FollowRow> for FollowRelationship {
    fn from(row: FollowRow) -> Self {
        FollowRelationship {
            leader_id: row.leader_id,
            follower_id: row.follower_id,
            follow_type: FollowType::from_column(row.follow_type),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Ordering and paging for follower/following listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub order: ListOrder,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            order: ListOrder::NewestFirst,
            limit: None,
            offset: 0,
        }
    }
}

impl ListOptions {
    pub fn oldest_first() -> Self {
        Self {
            order: ListOrder::OldestFirst,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> FollowResult<()> {
        if self.offset < 0 {
            return Err(FollowError::invalid("offset must not be negative"));
        }
        if matches!(self.limit, Some(limit) if limit <= 0) {
            return Err(FollowError::invalid("limit must be positive"));
        }
        Ok(())
    }
}

/// Query parameter selecting the follow type, e.g. `?type=blogs`
#[derive(Debug, Default, Deserialize)]
pub struct FollowTypeQuery {
    #[serde(default, rename = "type")]
    pub follow_type: FollowType,
}

/// Query parameters for paginated follow lists
#[derive(Debug, Deserialize)]
pub struct FollowListFilter {
    #[serde(default, rename = "type")]
    pub follow_type: FollowType,
    #[serde(default)]
    pub order: ListOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for paginated followers/following lists
#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub ids: Vec<i64>,
    pub total: i64,
    pub has_more: bool,
}

/// Response for follow/unfollow actions
#[derive(Debug, Serialize)]
pub struct FollowActionResponse {
    pub following: bool,
    /// Absent when the count could not be read after the write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<i64>,
}

/// Request payload for bulk follow status check
#[derive(Debug, Deserialize, Validate)]
pub struct BulkFollowCheckRequest {
    #[validate(length(max = 100, message = "Maximum 100 leader IDs allowed per request"))]
    pub leader_ids: Vec<i64>,
    #[serde(default)]
    pub follow_type: FollowType,
}

/// Response after removing a user's follow data
#[derive(Debug, Serialize)]
pub struct RemovedDataResponse {
    pub removed: u64,
}
