use std::sync::Arc;

use blog_follow::{
    app,
    config::settings::Settings,
    follows::{FollowEvent, FollowStore, PgFollowRepository},
    AppState,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blog_follow=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::new()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await?;

    info!("database connected");

    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut store = FollowStore::new(Arc::new(PgFollowRepository::new(pool)));
    store.subscribe(Arc::new(|event: &FollowEvent| -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(event = event.name(), "{}", payload);
        Ok(())
    }));

    let app_state = AppState {
        store,
        settings: settings.clone(),
    };

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
