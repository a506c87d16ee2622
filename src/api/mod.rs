pub mod accounts;
pub mod topups;
pub mod webhooks;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::database::repository::AccountStore;
use crate::services::{TopupService, WebhookProcessor};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<WebhookProcessor>,
    pub topups: Arc<TopupService>,
    pub accounts: Arc<dyn AccountStore>,
    pub pool: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/payments", post(webhooks::handle_payment_webhook))
        .route("/topups", post(topups::create_topup))
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/{id}", get(accounts::get_account))
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match crate::database::health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "healthy"}))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "error": e.to_string()})),
        )
            .into_response(),
    }
}
