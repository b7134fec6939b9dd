//! Vehicle-facing endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{body, require_non_empty, ApiResult};
use crate::auth::{session_cookie, ChairSession, CHAIR_SESSION_COOKIE};
use crate::config::StatusAppendMode;
use crate::errors::AppError;
use crate::models::{
    ChairActivityRequest, Coordinate, NotificationResponse, PostRideStatusRequest,
    RecordCoordinateResponse, RegisterChairRequest, RideStatus,
};
use crate::AppState;

/// POST /api/vehicles - Register a vehicle against an owner's register token.
pub async fn register_vehicle(
    State(state): State<AppState>,
    payload: Result<Json<RegisterChairRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = body(payload)?;
    require_non_empty(
        &[&request.name, &request.model, &request.chair_register_token],
        "some of required fields(name, model, chair_register_token) are empty",
    )?;

    let chair = state.repo.create_chair(&request).await?;
    let cookie = session_cookie(CHAIR_SESSION_COOKIE, &chair.access_token);

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(chair)))
}

/// POST /api/vehicles/activity - Toggle the active flag.
pub async fn post_activity(
    State(state): State<AppState>,
    ChairSession(chair): ChairSession,
    payload: Result<Json<ChairActivityRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(payload)?;
    state
        .repo
        .set_chair_activity(&chair.id, request.is_active)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/vehicles/coordinates - Record a position report.
pub async fn post_coordinate(
    State(state): State<AppState>,
    ChairSession(chair): ChairSession,
    payload: Result<Json<Coordinate>, JsonRejection>,
) -> ApiResult<Json<RecordCoordinateResponse>> {
    let coordinate = body(payload)?;
    let mode = state.config.status_append;

    let recorded = state
        .repo
        .record_coordinate(&chair.id, coordinate, mode)
        .await?;

    if let (StatusAppendMode::Background, Some(transition)) = (mode, recorded.transition) {
        let repo = state.repo.clone();
        tokio::spawn(async move {
            match repo
                .append_transition(&transition.ride_id, transition.status)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    ride_id = %transition.ride_id,
                    status = %transition.status,
                    "Background status append skipped; ride moved on"
                ),
                Err(e) => tracing::error!(
                    ride_id = %transition.ride_id,
                    status = %transition.status,
                    "Background status append failed: {}",
                    e
                ),
            }
        });
    }

    Ok(Json(RecordCoordinateResponse {
        recorded_at: recorded.recorded_at,
    }))
}

/// GET /api/vehicles/notification - Short-poll for the next undelivered event.
pub async fn get_notification(
    State(state): State<AppState>,
    ChairSession(chair): ChairSession,
) -> ApiResult<Json<NotificationResponse>> {
    let data = state.repo.poll_notification(&chair.id).await?;
    Ok(Json(NotificationResponse {
        data,
        retry_after_ms: state.config.notification_retry_ms,
    }))
}

/// POST /api/vehicles/rides/:ride_id/status - Explicit `ENROUTE` / `CARRYING`.
pub async fn post_ride_status(
    State(state): State<AppState>,
    ChairSession(chair): ChairSession,
    Path(ride_id): Path<String>,
    payload: Result<Json<PostRideStatusRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(payload)?;
    let status = RideStatus::parse_driver_transition(&request.status)
        .ok_or_else(|| AppError::Validation("invalid status".to_string()))?;

    state
        .repo
        .post_ride_status(&chair.id, &ride_id, status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
