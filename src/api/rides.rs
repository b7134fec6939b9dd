//! Rider-facing endpoints: registration and ride requests.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{body, require_non_empty, ApiResult};
use crate::auth::{session_cookie, UserSession, APP_SESSION_COOKIE};
use crate::models::{CreateRideRequest, CreateRideResponse, RegisterUserRequest, RideDetail};
use crate::AppState;

/// POST /api/users - Register a rider.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = body(payload)?;
    require_non_empty(
        &[&request.username, &request.firstname, &request.lastname],
        "required fields(username, firstname, lastname) are empty",
    )?;

    let user = state.repo.create_user(&request).await?;
    let cookie = session_cookie(APP_SESSION_COOKIE, &user.access_token);

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(user)))
}

/// POST /api/rides - Request a ride.
pub async fn create_ride(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    payload: Result<Json<CreateRideRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateRideResponse>)> {
    let request = body(payload)?;
    let ride = state.repo.create_ride(&user.id, &request).await?;
    Ok((StatusCode::ACCEPTED, Json(ride)))
}

/// GET /api/rides/:ride_id - Ride with status history.
pub async fn get_ride(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    Path(ride_id): Path<String>,
) -> ApiResult<Json<RideDetail>> {
    let detail = state.repo.get_ride_for_user(&user.id, &ride_id).await?;
    Ok(Json(detail))
}

/// POST /api/rides/:ride_id/complete - Finish an arrived ride.
pub async fn complete_ride(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    Path(ride_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repo.complete_ride(&user.id, &ride_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/rides/:ride_id/cancel - Cancel a ride that has not finished.
pub async fn cancel_ride(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    Path(ride_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repo.cancel_ride(&user.id, &ride_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
