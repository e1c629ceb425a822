use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::lifecycle::{advance_appointment, load_appointment, propose_appointment};
use crate::error::AppError;
use crate::models::appointment::{Appointment, AppointmentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/:id", get(get_appointment))
        .route("/appointments/:id/status", patch(update_appointment_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub offer_id: String,
    pub actor_id: String,
    pub date: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentStatusRequest {
    pub actor_id: String,
    pub status: AppointmentStatus,
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = propose_appointment(
        state.store.as_ref(),
        &payload.offer_id,
        &payload.actor_id,
        payload.date,
    )
    .await?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["appointment", appointment.status.as_str()])
        .inc();
    Ok(Json(appointment))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(load_appointment(state.store.as_ref(), &id).await?))
}

async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = advance_appointment(
        state.store.as_ref(),
        &id,
        &payload.actor_id,
        payload.status,
    )
    .await?;

    state
        .metrics
        .status_transitions_total
        .with_label_values(&["appointment", appointment.status.as_str()])
        .inc();
    Ok(Json(appointment))
}
