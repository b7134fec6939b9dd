//! Owner registration.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{body, require_non_empty, ApiResult};
use crate::auth::{session_cookie, OWNER_SESSION_COOKIE};
use crate::models::RegisterOwnerRequest;
use crate::AppState;

/// POST /api/owners - Register a fleet owner.
pub async fn register_owner(
    State(state): State<AppState>,
    payload: Result<Json<RegisterOwnerRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = body(payload)?;
    require_non_empty(&[&request.name], "name is required")?;

    let owner = state.repo.create_owner(&request).await?;
    let cookie = session_cookie(OWNER_SESSION_COOKIE, &owner.access_token);

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(owner)))
}
