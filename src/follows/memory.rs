use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{FollowError, FollowResult};

use super::{
    FollowCounts, FollowRelationship, FollowRepository, FollowType, ListOptions, ListOrder,
};

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// The next repository call fails before touching any row.
    NextQuery,
    /// The next delete-all fails after the leader side was staged but
    /// before the follower side.
    DeleteAllMidway,
    /// The next counts lookup fails. Writes before it still go through.
    NextCount,
}

#[derive(Debug, Clone)]
struct StoredFollow {
    seq: u64,
    relationship: FollowRelationship,
}

#[derive(Default)]
struct State {
    rows: Vec<StoredFollow>,
    next_seq: u64,
    fault: Option<FaultPoint>,
}

/// In-process follow repository.
///
/// Rows live behind one mutex, so the uniqueness check and the insert are a
/// single critical section. Every call bumps [`query_count`](Self::query_count).
#[derive(Default)]
pub struct MemoryFollowRepository {
    state: Mutex<State>,
    queries: AtomicUsize,
}

impl MemoryFollowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls served so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Arms a one-shot failure.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.lock().fault = Some(point);
    }

    /// Total number of stored rows across all follow types.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Rows are never left half-written, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the call and takes the lock, failing if a `NextQuery` fault is armed.
    fn begin(&self) -> FollowResult<MutexGuard<'_, State>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.fault == Some(FaultPoint::NextQuery) {
            state.fault = None;
            return Err(unavailable());
        }
        Ok(state)
    }
}

fn unavailable() -> FollowError {
    FollowError::StorageUnavailable(sqlx::Error::PoolTimedOut)
}

fn is_triple(
    row: &StoredFollow,
    leader_id: i64,
    follower_id: i64,
    follow_type: &FollowType,
) -> bool {
    let r = &row.relationship;
    r.leader_id == leader_id && r.follower_id == follower_id && &r.follow_type == follow_type
}

/// Sorts, then applies offset and limit.
fn page<F>(mut rows: Vec<&StoredFollow>, options: ListOptions, pick: F) -> Vec<i64>
where
    F: Fn(&FollowRelationship) -> i64,
{
    rows.sort_by_key(|row| (row.relationship.created_at, row.seq));
    if options.order == ListOrder::NewestFirst {
        rows.reverse();
    }

    let offset = usize::try_from(options.offset).unwrap_or(0);
    let limit = options
        .limit
        .and_then(|limit| usize::try_from(limit).ok())
        .unwrap_or(usize::MAX);

    rows.into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| pick(&row.relationship))
        .collect()
}

#[async_trait]
impl FollowRepository for MemoryFollowRepository {
    async fn insert(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>> {
        let mut state = self.begin()?;
        if state
            .rows
            .iter()
            .any(|row| is_triple(row, leader_id, follower_id, follow_type))
        {
            return Ok(None);
        }

        let relationship = FollowRelationship {
            leader_id,
            follower_id,
            follow_type: follow_type.clone(),
            created_at: Utc::now(),
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.push(StoredFollow {
            seq,
            relationship: relationship.clone(),
        });

        Ok(Some(relationship))
    }

    async fn delete(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>> {
        let mut state = self.begin()?;
        let position = state
            .rows
            .iter()
            .position(|row| is_triple(row, leader_id, follower_id, follow_type));

        Ok(position.map(|index| state.rows.remove(index).relationship))
    }

    async fn exists(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool> {
        let state = self.begin()?;
        Ok(state
            .rows
            .iter()
            .any(|row| is_triple(row, leader_id, follower_id, follow_type)))
    }

    async fn follower_ids(
        &self,
        leader_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        let state = self.begin()?;
        let rows = state
            .rows
            .iter()
            .filter(|row| {
                row.relationship.leader_id == leader_id
                    && &row.relationship.follow_type == follow_type
            })
            .collect();

        Ok(page(rows, options, |r| r.follower_id))
    }

    async fn leader_ids(
        &self,
        follower_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        let state = self.begin()?;
        let rows = state
            .rows
            .iter()
            .filter(|row| {
                row.relationship.follower_id == follower_id
                    && &row.relationship.follow_type == follow_type
            })
            .collect();

        Ok(page(rows, options, |r| r.leader_id))
    }

    async fn counts(&self, user_id: i64, follow_type: &FollowType) -> FollowResult<FollowCounts> {
        let mut state = self.begin()?;
        if state.fault == Some(FaultPoint::NextCount) {
            state.fault = None;
            return Err(unavailable());
        }

        let mut counts = FollowCounts::default();
        let rows = state
            .rows
            .iter()
            .filter(|row| &row.relationship.follow_type == follow_type);
        for row in rows {
            if row.relationship.leader_id == user_id {
                counts.followers += 1;
            }
            if row.relationship.follower_id == user_id {
                counts.following += 1;
            }
        }
        Ok(counts)
    }

    async fn followed_among(
        &self,
        leader_ids: &[i64],
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Vec<i64>> {
        let state = self.begin()?;
        Ok(state
            .rows
            .iter()
            .map(|row| &row.relationship)
            .filter(|r| {
                r.follower_id == follower_id
                    && &r.follow_type == follow_type
                    && leader_ids.contains(&r.leader_id)
            })
            .map(|r| r.leader_id)
            .collect())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> FollowResult<u64> {
        let mut state = self.begin()?;

        // Work on a staged copy and publish it only once both sides are done
        let before = state.rows.len();
        let mut staged = state.rows.clone();
        staged.retain(|row| row.relationship.leader_id != user_id);

        if state.fault == Some(FaultPoint::DeleteAllMidway) {
            state.fault = None;
            return Err(unavailable());
        }

        staged.retain(|row| row.relationship.follower_id != user_id);
        let removed = (before - staged.len()) as u64;
        state.rows = staged;

        Ok(removed)
    }
}
