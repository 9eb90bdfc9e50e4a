use crate::api::AppState;
use crate::domain::{Amount, Ledger, SettlementAction};
use crate::error::AppError;
use crate::orchestration::{InvestmentResult, SettlementResult};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub ledger: Ledger,
    pub action: SettlementAction,
    /// Seconds; required for reinvest.
    pub duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestRequest {
    pub token_id: u64,
    pub duration: u64,
    pub amount: Amount,
    #[serde(default)]
    pub use_deposit: bool,
}

pub async fn settle(
    State(state): State<AppState>,
    Json(body): Json<SettleRequest>,
) -> Result<Json<SettlementResult>, AppError> {
    let result = state
        .desk
        .execute(body.ledger, body.action, body.duration)
        .await?;
    Ok(Json(result))
}

pub async fn invest(
    State(state): State<AppState>,
    Json(body): Json<InvestRequest>,
) -> Result<Json<InvestmentResult>, AppError> {
    let result = state
        .desk
        .invest(body.token_id, body.duration, body.amount, body.use_deposit)
        .await?;
    Ok(Json(result))
}
