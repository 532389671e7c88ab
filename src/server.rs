//! Application assembly: storage selection, route merging and middleware.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{ServiceConfig, StorageConfig};
use crate::error::Result;
use crate::onboarding::{
    OnboardingManager, OnboardingRouteState, onboarding_routes, spawn_session_sweeper,
};
use crate::records::{RecordRouteState, record_routes};
use crate::store::{Database, LibSqlBackend, MemoryDatabase};

/// Open the configured backend. Migrations run as part of opening.
pub async fn open_database(storage: &StorageConfig) -> Result<Arc<dyn Database>> {
    let db: Arc<dyn Database> = match storage {
        StorageConfig::Local { path } => Arc::new(LibSqlBackend::new_local(path).await?),
        StorageConfig::Remote { url, auth_token } => {
            Arc::new(LibSqlBackend::new_remote(url, auth_token).await?)
        }
        StorageConfig::Memory => {
            info!("Using in-memory storage; nothing survives a restart");
            Arc::new(MemoryDatabase::new())
        }
    };
    Ok(db)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "onboarding-flow"
    }))
}

/// Merge every route group and wrap them in the HTTP middleware.
pub fn router(manager: Arc<OnboardingManager>, db: Arc<dyn Database>, cors_any_origin: bool) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .merge(onboarding_routes(OnboardingRouteState { manager }))
        .merge(record_routes(RecordRouteState { db }));

    // A bare CorsLayer answers no cross-origin requests.
    let cors = if cors_any_origin {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

/// Open storage, load the saved layout, start the idle-session sweeper and
/// build the router.
pub async fn build_app(config: &ServiceConfig) -> Result<Router> {
    let db = open_database(&config.storage).await?;
    let manager = Arc::new(OnboardingManager::load(db.clone()).await?.with_limits(config.sessions));
    spawn_session_sweeper(manager.clone());
    Ok(router(manager, db, config.cors_any_origin))
}
