mod config;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::state::{AppState, AppStateInner};
use agora_db::{Database, SqliteStores};
use agora_visibility::VisibilityEngine;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let stores = Arc::new(SqliteStores::new(db.clone()));
    let engine = VisibilityEngine::new(stores.clone(), stores, config.engine);
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        engine,
        jwt_secret: config.jwt_secret.clone(),
        message_limit: config.message_limit,
    });

    let app = Router::new()
        .merge(agora_api::router(app_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!(
        "Agora server listening on {} (sender lookup failure: {:?})",
        config.addr, config.engine.sender_lookup_failure
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
