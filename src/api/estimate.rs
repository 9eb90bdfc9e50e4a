use crate::api::AppState;
use crate::engine::EstimateState;
use crate::orchestration::ReinvestEstimate;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct EstimateBody {
    /// Seconds. Falls back to the configured default within the item's range.
    pub duration: Option<u64>,
}

pub async fn get_estimate(State(state): State<AppState>) -> Json<EstimateState> {
    Json(state.desk.estimate())
}

pub async fn estimate_reinvest(
    State(state): State<AppState>,
    Json(body): Json<EstimateBody>,
) -> Json<ReinvestEstimate> {
    Json(state.desk.estimate_reinvest(body.duration).await)
}
