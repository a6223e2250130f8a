use std::{collections::HashSet, sync::Arc};

use tracing::{debug, info};

use crate::error::{FollowError, FollowResult};

use super::{
    FollowCounts, FollowEvent, FollowObserver, FollowRepository, FollowType, ListOptions,
    Observers,
};

/// Follow relationships and the queries over them.
///
/// Arguments are validated before the repository is touched. Events go out
/// only after the change is persisted.
#[derive(Clone)]
pub struct FollowStore {
    repo: Arc<dyn FollowRepository>,
    observers: Observers,
}

fn ensure_id(name: &str, id: i64) -> FollowResult<()> {
    if id <= 0 {
        return Err(FollowError::invalid(format!(
            "{} must be a positive integer, got {}",
            name, id
        )));
    }
    Ok(())
}

impl FollowStore {
    pub fn new(repo: Arc<dyn FollowRepository>) -> Self {
        Self {
            repo,
            observers: Observers::new(),
        }
    }

    /// Registers an observer. Do this before the store is shared.
    pub fn subscribe(&mut self, observer: Arc<dyn FollowObserver>) {
        self.observers.register(observer);
    }

    /// Starts following. Returns `false` when the relationship already exists.
    pub async fn follow(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool> {
        ensure_id("leader_id", leader_id)?;
        ensure_id("follower_id", follower_id)?;

        let Some(relationship) = self.repo.insert(leader_id, follower_id, follow_type).await? else {
            debug!(
                "User {} already follows {} ({:?})",
                follower_id, leader_id, follow_type
            );
            return Ok(false);
        };

        debug!(
            "User {} started following {} ({:?})",
            follower_id, leader_id, follow_type
        );
        self.observers.dispatch(&FollowEvent::Started(relationship));
        Ok(true)
    }

    /// Stops following. Returns `false` when there was nothing to remove.
    pub async fn unfollow(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool> {
        ensure_id("leader_id", leader_id)?;
        ensure_id("follower_id", follower_id)?;

        let Some(relationship) = self.repo.delete(leader_id, follower_id, follow_type).await? else {
            return Ok(false);
        };

        debug!(
            "User {} stopped following {} ({:?})",
            follower_id, leader_id, follow_type
        );
        self.observers.dispatch(&FollowEvent::Stopped(relationship));
        Ok(true)
    }

    pub async fn is_following(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool> {
        ensure_id("leader_id", leader_id)?;
        ensure_id("follower_id", follower_id)?;

        self.repo.exists(leader_id, follower_id, follow_type).await
    }

    /// Ids following `user_id`, newest relationship first unless `options`
    /// says otherwise.
    pub async fn get_followers(
        &self,
        user_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        ensure_id("user_id", user_id)?;
        options.validate()?;

        self.repo.follower_ids(user_id, follow_type, options).await
    }

    /// Ids `user_id` follows.
    pub async fn get_following(
        &self,
        user_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        ensure_id("user_id", user_id)?;
        options.validate()?;

        self.repo.leader_ids(user_id, follow_type, options).await
    }

    pub async fn get_counts(
        &self,
        user_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<FollowCounts> {
        ensure_id("user_id", user_id)?;

        self.repo.counts(user_id, follow_type).await
    }

    /// Which of `leader_ids` does `follower_id` follow? One query for the
    /// whole batch, none for an empty one.
    pub async fn bulk_check_follow_status(
        &self,
        leader_ids: &HashSet<i64>,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<HashSet<i64>> {
        ensure_id("follower_id", follower_id)?;
        for &leader_id in leader_ids {
            ensure_id("leader_id", leader_id)?;
        }

        if leader_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let candidates: Vec<i64> = leader_ids.iter().copied().collect();
        let followed = self
            .repo
            .followed_among(&candidates, follower_id, follow_type)
            .await?;

        Ok(followed.into_iter().collect())
    }

    /// Removes every relationship `user_id` takes part in, on both sides and
    /// in every follow type. Used when an account is deleted or marked as spam.
    pub async fn delete_all_for_user(&self, user_id: i64) -> FollowResult<u64> {
        ensure_id("user_id", user_id)?;

        self.observers
            .dispatch(&FollowEvent::RemovingUserData { user_id });

        let removed = self.repo.delete_all_for_user(user_id).await?;

        info!("Removed {} follow relationships for user {}", removed, user_id);
        self.observers
            .dispatch(&FollowEvent::UserDataRemoved { user_id, removed });
        Ok(removed)
    }
}
