use crate::api::AppState;
use crate::domain::{Ledger, LockId};
use crate::error::AppError;
use crate::orchestration::{SelectionChange, SelectionView};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    #[serde(flatten)]
    pub change: SelectionChange,
    pub selection: SelectionView,
}

#[derive(Debug, Deserialize)]
pub struct SelectAllRequest {
    pub ledger: Ledger,
}

pub async fn get_selection(State(state): State<AppState>) -> Json<SelectionView> {
    Json(state.desk.selection())
}

pub async fn toggle(
    State(state): State<AppState>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let id: LockId = body.id.parse()?;
    let change = state.desk.toggle(&id)?;
    Ok(Json(ToggleResponse {
        change,
        selection: state.desk.selection(),
    }))
}

pub async fn select_all(
    State(state): State<AppState>,
    Json(body): Json<SelectAllRequest>,
) -> Json<SelectionView> {
    Json(state.desk.select_all_matured(body.ledger))
}

pub async fn clear(State(state): State<AppState>) -> Json<SelectionView> {
    state.desk.clear();
    Json(state.desk.selection())
}
