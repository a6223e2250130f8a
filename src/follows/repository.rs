use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::FollowResult;

use super::{FollowCounts, FollowRelationship, FollowRow, FollowType, ListOptions, ListOrder};

/// Storage seam for follow relationships. Every method is one round trip
/// to the backing store.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Inserts the triple unless it already exists. Returns the new row, or
    /// `None` when the triple was already present.
    async fn insert(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>>;

    /// Deletes the triple. Returns the removed row, or `None` if absent.
    async fn delete(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>>;

    async fn exists(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool>;

    /// Follower ids of `leader_id`.
    async fn follower_ids(
        &self,
        leader_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>>;

    /// Leader ids followed by `follower_id`.
    async fn leader_ids(
        &self,
        follower_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>>;

    async fn counts(&self, user_id: i64, follow_type: &FollowType) -> FollowResult<FollowCounts>;

    /// The subset of `leader_ids` that `follower_id` follows.
    async fn followed_among(
        &self,
        leader_ids: &[i64],
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Vec<i64>>;

    /// Removes every row naming `user_id` on either side, in any follow
    /// type, atomically. Returns the number of rows removed.
    async fn delete_all_for_user(&self, user_id: i64) -> FollowResult<u64>;
}

/// PostgreSQL-backed repository. Uniqueness of the triple is enforced by
/// the `follows_unique_triple` constraint.
#[derive(Clone)]
pub struct PgFollowRepository {
    pool: PgPool,
}

impl PgFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn order_clause(order: ListOrder) -> &'static str {
        match order {
            ListOrder::NewestFirst => "created_at DESC, id DESC",
            ListOrder::OldestFirst => "created_at ASC, id ASC",
        }
    }
}

#[async_trait]
impl FollowRepository for PgFollowRepository {
    async fn insert(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>> {
        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            INSERT INTO follows (leader_id, follower_id, follow_type, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (leader_id, follower_id, follow_type) DO NOTHING
            RETURNING leader_id, follower_id, follow_type, created_at
            "#,
        )
        .bind(leader_id)
        .bind(follower_id)
        .bind(follow_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FollowRelationship::from))
    }

    async fn delete(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Option<FollowRelationship>> {
        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            DELETE FROM follows
            WHERE leader_id = $1 AND follower_id = $2 AND follow_type = $3
            RETURNING leader_id, follower_id, follow_type, created_at
            "#,
        )
        .bind(leader_id)
        .bind(follower_id)
        .bind(follow_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FollowRelationship::from))
    }

    async fn exists(
        &self,
        leader_id: i64,
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<bool> {
        let found = sqlx::query(
            "SELECT 1 FROM follows WHERE leader_id = $1 AND follower_id = $2 AND follow_type = $3",
        )
        .bind(leader_id)
        .bind(follower_id)
        .bind(follow_type.as_str())
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        Ok(found)
    }

    async fn follower_ids(
        &self,
        leader_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        // LIMIT NULL means no limit in Postgres
        let query_str = format!(
            r#"
            SELECT follower_id FROM follows
            WHERE leader_id = $1 AND follow_type = $2
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            Self::order_clause(options.order)
        );

        let ids = sqlx::query_scalar::<_, i64>(&query_str)
            .bind(leader_id)
            .bind(follow_type.as_str())
            .bind(options.limit)
            .bind(options.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn leader_ids(
        &self,
        follower_id: i64,
        follow_type: &FollowType,
        options: ListOptions,
    ) -> FollowResult<Vec<i64>> {
        let query_str = format!(
            r#"
            SELECT leader_id FROM follows
            WHERE follower_id = $1 AND follow_type = $2
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            Self::order_clause(options.order)
        );

        let ids = sqlx::query_scalar::<_, i64>(&query_str)
            .bind(follower_id)
            .bind(follow_type.as_str())
            .bind(options.limit)
            .bind(options.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn counts(&self, user_id: i64, follow_type: &FollowType) -> FollowResult<FollowCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE leader_id = $1 AND follow_type = $2) AS followers,
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND follow_type = $2) AS following
            "#,
        )
        .bind(user_id)
        .bind(follow_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowCounts {
            followers: row.try_get("followers")?,
            following: row.try_get("following")?,
        })
    }

    async fn followed_among(
        &self,
        leader_ids: &[i64],
        follower_id: i64,
        follow_type: &FollowType,
    ) -> FollowResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT leader_id FROM follows
            WHERE follower_id = $1 AND follow_type = $2 AND leader_id = ANY($3)
            "#,
        )
        .bind(follower_id)
        .bind(follow_type.as_str())
        .bind(leader_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn delete_all_for_user(&self, user_id: i64) -> FollowResult<u64> {
        // Both sides go in one transaction; an early return drops `tx` and rolls back
        let mut tx = self.pool.begin().await?;

        let as_leader = sqlx::query("DELETE FROM follows WHERE leader_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let as_follower = sqlx::query("DELETE FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(
            "Deleted follow rows for user {}: {} as leader, {} as follower",
            user_id, as_leader, as_follower
        );
        Ok(as_leader + as_follower)
    }
}
