//! REST endpoints for the contact record store.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, warn};

use super::cache::parse_cached_records;
use super::model::CreateContact;
use crate::store::Database;

/// Shared state for record routes.
#[derive(Clone)]
pub struct RecordRouteState {
    pub db: Arc<dyn Database>,
}

fn storage_unavailable(e: impl std::fmt::Display) -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"error": format!("Storage unavailable: {e}")})),
    )
        .into_response()
}

/// GET /api/userdata
///
/// All records, newest first.
async fn list_records(State(state): State<RecordRouteState>) -> impl IntoResponse {
    match state.db.list_contacts().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list contact records");
            storage_unavailable(e)
        }
    }
}

/// POST /api/userdata
async fn create_record(
    State(state): State<RecordRouteState>,
    Json(body): Json<CreateContact>,
) -> impl IntoResponse {
    let Some((name, email)) = body.validated() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Name and email required"})),
        )
            .into_response();
    };

    match state.db.insert_contact(name, email).await {
        Ok(record) => {
            info!(record_id = %record.id, "Contact record created");
            (StatusCode::OK, Json(record)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to create contact record");
            storage_unavailable(e)
        }
    }
}

/// POST /api/userdata/import
///
/// Accepts a cached record blob as the raw body and stores every entry in
/// one batch. A malformed blob or a storage failure imports nothing.
async fn import_records(State(state): State<RecordRouteState>, body: String) -> impl IntoResponse {
    let cached = parse_cached_records(&body);
    let entries: Vec<(&str, &str)> = cached
        .iter()
        .map(|entry| (entry.name.trim(), entry.email.trim()))
        .filter(|(name, email)| !name.is_empty() && !email.is_empty())
        .collect();

    match state.db.insert_contacts(&entries).await {
        Ok(imported) => {
            info!(count = imported.len(), "Imported cached contact records");
            Json(serde_json::json!({
                "imported": imported.len(),
                "records": imported,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, entries = entries.len(), "Import rolled back on storage error");
            storage_unavailable(e)
        }
    }
}

/// Build the record store REST routes.
pub fn record_routes(state: RecordRouteState) -> Router {
    Router::new()
        .route("/api/userdata", get(list_records).post(create_record))
        .route("/api/userdata/import", post(import_records))
        .with_state(state)
}
