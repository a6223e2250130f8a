//! Helpers for content loops, e.g. a page of the sites directory.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::FollowResult;

use super::{FollowStore, FollowType, ListOptions};

/// Something a user can follow, as it appears in a listing.
pub trait Followable {
    fn leader_id(&self) -> i64;
}

impl Followable for i64 {
    fn leader_id(&self) -> i64 {
        *self
    }
}

/// A listing item paired with the viewer's follow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithFollowStatus<T> {
    #[serde(flatten)]
    pub item: T,
    pub is_following: bool,
}

/// Pairs every item with whether `viewer` follows it.
///
/// Items default to not followed. Anonymous viewers and empty pages cost no
/// query; anything else costs exactly one bulk check.
pub async fn annotate_follow_status<T: Followable>(
    store: &FollowStore,
    items: Vec<T>,
    viewer: Option<i64>,
    follow_type: &FollowType,
) -> FollowResult<Vec<WithFollowStatus<T>>> {
    let followed = match viewer {
        Some(viewer_id) if !items.is_empty() => {
            let leader_ids: HashSet<i64> = items.iter().map(Followable::leader_id).collect();
            store
                .bulk_check_follow_status(&leader_ids, viewer_id, follow_type)
                .await?
        }
        _ => HashSet::new(),
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let is_following = followed.contains(&item.leader_id());
            WithFollowStatus { item, is_following }
        })
        .collect())
}

/// The set of leaders a "following" tab should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowingScope {
    /// The user follows nothing, so the loop must come back empty.
    Nothing,
    Leaders(HashSet<i64>),
}

impl FollowingScope {
    pub fn contains(&self, leader_id: i64) -> bool {
        match self {
            FollowingScope::Nothing => false,
            FollowingScope::Leaders(ids) => ids.contains(&leader_id),
        }
    }

    /// Keeps only items whose leader is in scope.
    pub fn retain<T: Followable>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.contains(item.leader_id()))
            .collect()
    }
}

pub async fn following_scope(
    store: &FollowStore,
    user_id: i64,
    follow_type: &FollowType,
) -> FollowResult<FollowingScope> {
    let leaders = store
        .get_following(user_id, follow_type, ListOptions::default())
        .await?;

    if leaders.is_empty() {
        return Ok(FollowingScope::Nothing);
    }
    Ok(FollowingScope::Leaders(leaders.into_iter().collect()))
}
