use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod error;
pub mod follows;
pub mod response;

use config::settings::Settings;
use follows::{handler, FollowStore};

#[derive(Clone)]
pub struct AppState {
    pub store: FollowStore,
    pub settings: Settings,
}

impl FromRef<AppState> for FollowStore {
    fn from_ref(app_state: &AppState) -> FollowStore {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

pub fn app(app_state: AppState) -> Router {
    let follow_router = Router::new().route(
        "/:leader_id",
        post(handler::follow)
            .delete(handler::unfollow)
            .get(handler::check_following),
    );

    let user_router = Router::new()
        .route("/:id/followers", get(handler::get_followers))
        .route("/:id/following", get(handler::get_following))
        .route("/:id/follow-counts", get(handler::get_counts));

    Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/api/follow-status", post(handler::check_following_bulk))
        .route(
            "/api/me/follows",
            axum::routing::delete(handler::remove_my_follow_data),
        )
        .nest("/api/follows", follow_router)
        .nest("/api/users", user_router)
        .with_state(app_state)
}
