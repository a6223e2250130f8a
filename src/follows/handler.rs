use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use tracing::warn;
use validator::Validate;

use crate::{
    auth::Claims,
    error::AppError,
    follows::{
        listing::annotate_follow_status, BulkFollowCheckRequest, FollowActionResponse,
        FollowListFilter, FollowListResponse, FollowStore, FollowType, FollowTypeQuery,
        ListOptions, RemovedDataResponse,
    },
    response::ApiResponse,
};

/// The write has already committed, so a failed count drops the field
/// instead of failing the request.
async fn followers_after_write(
    store: &FollowStore,
    leader_id: i64,
    follow_type: &FollowType,
) -> Option<i64> {
    match store.get_counts(leader_id, follow_type).await {
        Ok(counts) => Some(counts.followers),
        Err(e) => {
            warn!("Could not refresh follower count for {}: {}", leader_id, e);
            None
        }
    }
}

/// Follow a user or site
/// POST /api/follows/:leader_id?type=blogs
pub async fn follow(
    State(store): State<FollowStore>,
    claims: Claims,
    Path(leader_id): Path<i64>,
    Query(query): Query<FollowTypeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let follow_type = query.follow_type;

    // Only users can follow themselves by accident; a blog id may equal a user id
    if follow_type == FollowType::Default && claims.sub == leader_id {
        return Err(AppError::UnprocessableEntity(
            "You cannot follow yourself".to_string(),
        ));
    }

    if !store.follow(leader_id, claims.sub, &follow_type).await? {
        return Err(AppError::Conflict(format!(
            "You are already following that {}.",
            follow_type.leader_noun()
        )));
    }

    Ok(ApiResponse::success_with_message(
        format!("You are now following that {}.", follow_type.leader_noun()),
        FollowActionResponse {
            following: true,
            followers_count: followers_after_write(&store, leader_id, &follow_type).await,
        },
    )
    .created())
}

/// Unfollow a user or site
/// DELETE /api/follows/:leader_id?type=blogs
pub async fn unfollow(
    State(store): State<FollowStore>,
    claims: Claims,
    Path(leader_id): Path<i64>,
    Query(query): Query<FollowTypeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let follow_type = query.follow_type;

    if !store.unfollow(leader_id, claims.sub, &follow_type).await? {
        return Err(AppError::NotFound(format!(
            "You are not following that {}.",
            follow_type.leader_noun()
        )));
    }

    Ok(ApiResponse::success_with_message(
        format!("You are no longer following that {}.", follow_type.leader_noun()),
        FollowActionResponse {
            following: false,
            followers_count: followers_after_write(&store, leader_id, &follow_type).await,
        },
    ))
}

/// Check if the current user follows a leader
/// GET /api/follows/:leader_id?type=blogs
pub async fn check_following(
    State(store): State<FollowStore>,
    claims: Claims,
    Path(leader_id): Path<i64>,
    Query(query): Query<FollowTypeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let is_following = store
        .is_following(leader_id, claims.sub, &query.follow_type)
        .await?;

    Ok(ApiResponse::success(
        serde_json::json!({ "following": is_following }),
    ))
}

/// Check follow status for a whole page of leaders at once
/// POST /api/follow-status
///
/// Costs one query regardless of how many ids are sent, instead of one
/// is-following request per item in a listing.
pub async fn check_following_bulk(
    State(store): State<FollowStore>,
    claims: Claims,
    Json(payload): Json<BulkFollowCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let annotated = annotate_follow_status(
        &store,
        payload.leader_ids,
        Some(claims.sub),
        &payload.follow_type,
    )
    .await?;

    let result: HashMap<i64, bool> = annotated
        .into_iter()
        .map(|entry| (entry.item, entry.is_following))
        .collect();

    Ok(ApiResponse::success(result))
}

fn list_options(filter: &FollowListFilter) -> ListOptions {
    ListOptions {
        order: filter.order,
        limit: Some(filter.limit.unwrap_or(20).min(100)),
        offset: filter.offset.unwrap_or(0),
    }
}

fn has_more(options: &ListOptions, total: i64) -> bool {
    options.offset.saturating_add(options.limit.unwrap_or(0)) < total
}

/// Get a user's (or site's) followers
/// GET /api/users/:id/followers
pub async fn get_followers(
    State(store): State<FollowStore>,
    Path(user_id): Path<i64>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let options = list_options(&filter);

    let ids = store
        .get_followers(user_id, &filter.follow_type, options)
        .await?;
    let total = store.get_counts(user_id, &filter.follow_type).await?.followers;

    Ok(ApiResponse::success(FollowListResponse {
        ids,
        total,
        has_more: has_more(&options, total),
    }))
}

/// Get what a user is following
/// GET /api/users/:id/following
pub async fn get_following(
    State(store): State<FollowStore>,
    Path(user_id): Path<i64>,
    Query(filter): Query<FollowListFilter>,
) -> Result<impl IntoResponse, AppError> {
    let options = list_options(&filter);

    let ids = store
        .get_following(user_id, &filter.follow_type, options)
        .await?;
    let total = store.get_counts(user_id, &filter.follow_type).await?.following;

    Ok(ApiResponse::success(FollowListResponse {
        ids,
        total,
        has_more: has_more(&options, total),
    }))
}

/// Follower and following totals, for nav badges
/// GET /api/users/:id/follow-counts
pub async fn get_counts(
    State(store): State<FollowStore>,
    Path(user_id): Path<i64>,
    Query(query): Query<FollowTypeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let counts = store.get_counts(user_id, &query.follow_type).await?;

    Ok(ApiResponse::success(counts))
}

/// Drop every follow relationship of the current user
/// DELETE /api/me/follows
pub async fn remove_my_follow_data(
    State(store): State<FollowStore>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let removed = store.delete_all_for_user(claims.sub).await?;

    Ok(ApiResponse::success(RemovedDataResponse { removed }))
}
