use std::sync::Arc;

use certportal::{config, db, routes, state, storage};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certportal=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;

    storage::ensure_dirs(&config.media_root, &config.assets_dir)?;

    let db = db::Db::open(config.database_url.as_deref()).await?;

    if config.staff_api_token.is_none() {
        tracing::warn!("STAFF_API_TOKEN not set; staff endpoints will reject every request");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(state::AppState::new(config, db)?);

    let app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("certportal listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
