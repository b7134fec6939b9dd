//! Internal endpoints driven by the scheduler and operators.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub readmitted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VacanciesResponse {
    pub chair_ids: Vec<String>,
}

/// GET /api/internal/matching - Run one dispatch cycle.
///
/// Always 204 on success, whether or not a ride was bound.
pub async fn trigger_matching(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.repo.try_match().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/internal/vacancies/reconcile - Re-admit stranded idle vehicles.
pub async fn reconcile_vacancies(
    State(state): State<AppState>,
) -> ApiResult<Json<ReconcileResponse>> {
    let readmitted = state.repo.reconcile_vacancies().await?;
    Ok(Json(ReconcileResponse { readmitted }))
}

/// GET /api/internal/vacancies - Current vacancy set.
pub async fn list_vacancies(State(state): State<AppState>) -> ApiResult<Json<VacanciesResponse>> {
    let chair_ids = state.repo.list_vacancies().await?;
    Ok(Json(VacanciesResponse { chair_ids }))
}
