use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.desk.snapshot();
    Json(serde_json::json!({
        "status": "ready",
        "connected": state.desk.is_connected(),
        "generation": snapshot.generation,
        "settlementInProgress": state.desk.settlement_in_progress(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
