//! REST endpoints for the wizard, the admin layout editor and data review.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::manager::{ComponentUpdate, OnboardingManager};
use super::model::FieldsPatch;
use super::session::RegistrationForm;
use crate::error::OnboardingError;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

impl OnboardingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::IncompleteStep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidPage(_)
            | Self::UnknownPreset(_)
            | Self::UnknownComponent(_)
            | Self::DuplicateComponent(_) => StatusCode::BAD_REQUEST,
            Self::StepMismatch { .. } | Self::InvalidTransition { .. } | Self::SessionBusy(_) => {
                StatusCode::CONFLICT
            }
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(error = %self, "Onboarding request failed on storage");
        }
        let mut body = serde_json::json!({"error": self.to_string()});
        if let Self::IncompleteStep { missing, .. } = &self {
            body["missing"] = serde_json::json!(missing);
        }
        (status, Json(body)).into_response()
    }
}

fn respond<T: Serialize>(result: Result<T, OnboardingError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn parse_session_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid session ID"})),
        )
            .into_response()
    })
}

// ── Sessions ────────────────────────────────────────────────────────────

/// POST /api/onboarding/sessions
async fn create_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.manager.create_session().await))
}

/// GET /api/onboarding/sessions/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.session_view(id).await),
        Err(response) => response,
    }
}

/// POST /api/onboarding/sessions/{id}/register
///
/// Step 1: create the user from email and password.
async fn register(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(form): Json<RegistrationForm>,
) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.register(id, &form).await),
        Err(response) => response,
    }
}

/// PATCH /api/onboarding/sessions/{id}/fields
async fn update_fields(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(patch): Json<FieldsPatch>,
) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.update_fields(id, patch).await),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct AdvanceRequest {
    step: u8,
}

/// POST /api/onboarding/sessions/{id}/advance
///
/// Body `{"step": n}` must name the step the session is on.
async fn advance(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceRequest>,
) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.advance(id, body.step).await),
        Err(response) => response,
    }
}

/// POST /api/onboarding/sessions/{id}/back
async fn go_back(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.go_back(id).await),
        Err(response) => response,
    }
}

/// POST /api/onboarding/sessions/{id}/restart
async fn restart(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.restart(id).await),
        Err(response) => response,
    }
}

/// GET /api/onboarding/sessions/{id}/summary
async fn summary(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    match parse_session_id(&id) {
        Ok(id) => respond(state.manager.summary(id).await),
        Err(response) => response,
    }
}

// ── Admin ───────────────────────────────────────────────────────────────

/// GET /api/admin/components
async fn list_components(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.layout_view().await)
}

/// GET /api/admin/pages
async fn list_pages(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.pages().await)
}

/// PUT /api/admin/components/{component}
///
/// Moves and/or toggles one component type. Both parts apply or neither does.
async fn update_component(
    State(state): State<OnboardingRouteState>,
    Path(component): Path<String>,
    Json(update): Json<ComponentUpdate>,
) -> Response {
    respond(state.manager.update_component(&component, update).await)
}

/// POST /api/admin/presets/{name}
async fn apply_preset(
    State(state): State<OnboardingRouteState>,
    Path(name): Path<String>,
) -> Response {
    respond(state.manager.apply_preset(&name).await)
}

/// POST /api/admin/save
async fn save_layout(State(state): State<OnboardingRouteState>) -> Response {
    respond(state.manager.save_layout().await)
}

// ── Data review ─────────────────────────────────────────────────────────

/// GET /api/users
async fn list_users(State(state): State<OnboardingRouteState>) -> Response {
    respond(state.manager.list_users().await)
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/sessions", post(create_session))
        .route("/api/onboarding/sessions/{id}", get(get_session))
        .route("/api/onboarding/sessions/{id}/register", post(register))
        .route("/api/onboarding/sessions/{id}/fields", patch(update_fields))
        .route("/api/onboarding/sessions/{id}/advance", post(advance))
        .route("/api/onboarding/sessions/{id}/back", post(go_back))
        .route("/api/onboarding/sessions/{id}/restart", post(restart))
        .route("/api/onboarding/sessions/{id}/summary", get(summary))
        .route("/api/admin/components", get(list_components))
        .route("/api/admin/components/{component}", put(update_component))
        .route("/api/admin/pages", get(list_pages))
        .route("/api/admin/presets/{name}", post(apply_preset))
        .route("/api/admin/save", post(save_layout))
        .route("/api/users", get(list_users))
        .with_state(state)
}
