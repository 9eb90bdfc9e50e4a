pub mod estimate;
pub mod health;
pub mod locks;
pub mod selection;
pub mod settle;

use crate::orchestration::LockDesk;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<LockDesk>,
}

impl AppState {
    pub fn new(desk: Arc<LockDesk>) -> Self {
        Self { desk }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/locks", get(locks::get_locks))
        .route("/v1/refresh", post(locks::refresh))
        .route("/v1/selection", get(selection::get_selection))
        .route("/v1/selection/toggle", post(selection::toggle))
        .route("/v1/selection/select-all", post(selection::select_all))
        .route("/v1/selection/clear", post(selection::clear))
        .route(
            "/v1/estimate",
            get(estimate::get_estimate).post(estimate::estimate_reinvest),
        )
        .route("/v1/settle", post(settle::settle))
        .route("/v1/invest", post(settle::invest))
        .layer(cors)
        .with_state(state)
}
