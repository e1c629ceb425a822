use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use serde::Serialize;

use crate::engine::aggregator::StatusSummary;
use crate::error::AppError;
use crate::models::user::{USERS, User};
use crate::state::AppState;
use crate::store::Document;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:id", get(get_user).put(put_user))
        .route("/users/:id/dashboard", get(dashboard))
        .route("/users/:id/pending", get(pending))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub pending_actions: usize,
}

async fn put_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut payload): Json<User>,
) -> Result<Json<User>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::BadRequest("username cannot be empty".to_string()));
    }

    payload.id = id.clone();
    state
        .store
        .set(USERS, Document::from_record(id, &payload)?)
        .await?;

    Ok(Json(payload))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let document = state
        .store
        .get(USERS, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

    Ok(Json(document.decode(USERS)?))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<StatusSummary> {
    Json(state.aggregator.summarize(Some(&id)).await)
}

async fn pending(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Json<PendingResponse> {
    Json(PendingResponse {
        pending_actions: state.aggregator.pending_actions(Some(&id)).await,
    })
}
