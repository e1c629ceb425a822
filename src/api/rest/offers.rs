use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;

use crate::engine::lifecycle::{NewOffer, load_offer, respond_to_offer, submit_offer};
use crate::error::AppError;
use crate::models::offer::{Offer, OfferStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers", post(create_offer))
        .route("/offers/:id", get(get_offer))
        .route("/offers/:id/status", patch(update_offer_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub project_id: String,
    pub author_id: String,
    pub user_id: String,
    pub price: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfferStatusRequest {
    pub actor_id: String,
    pub status: OfferStatus,
}

async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let offer = submit_offer(
        state.store.as_ref(),
        NewOffer {
            project_id: payload.project_id,
            requester_id: payload.author_id,
            provider_id: payload.user_id,
            price: payload.price,
            message: payload.message,
        },
    )
    .await?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["offer", offer.status.as_str()])
        .inc();
    Ok(Json(offer))
}

async fn get_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(load_offer(state.store.as_ref(), &id).await?))
}

async fn update_offer_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOfferStatusRequest>,
) -> Result<Json<Offer>, AppError> {
    let offer = respond_to_offer(
        state.store.as_ref(),
        &id,
        &payload.actor_id,
        payload.status,
    )
    .await?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["offer", offer.status.as_str()])
        .inc();
    Ok(Json(offer))
}
