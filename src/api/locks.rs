use crate::api::AppState;
use crate::error::AppError;
use crate::orchestration::LocksView;
use axum::extract::State;
use axum::Json;

pub async fn get_locks(State(state): State<AppState>) -> Json<LocksView> {
    Json(state.desk.locks_view())
}

/// Re-fetch both ledgers. Selections survive; stale ones are caught at settlement.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<LocksView>, AppError> {
    state.desk.refresh().await?;
    Ok(Json(state.desk.locks_view()))
}
