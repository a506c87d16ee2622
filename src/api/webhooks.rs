use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::services::webhook_processor::{WebhookError, WebhookOutcome};

/// POST /webhooks/payments
///
/// Response policy: 2xx acknowledges the delivery and stops gateway
/// retries, so it covers every accepted outcome AND every permanent
/// failure (those are logged for alerting instead). Only retryable
/// failures answer 5xx, which asks the gateway to redeliver.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match state
        .processor
        .process(&body, signature.as_deref(), &request_id)
        .await
    {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Credited {
                    payment_id,
                    credits,
                    ..
                } => {
                    info!(%payment_id, credits, "webhook credited payment");
                }
                WebhookOutcome::Rejected { payment_id } => {
                    info!(%payment_id, "webhook rejected payment");
                }
                WebhookOutcome::AlreadyProcessed { payment_id } => {
                    info!(%payment_id, "webhook duplicate delivery");
                }
                WebhookOutcome::Ignored => {}
            }
            (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
        }
        Err(WebhookError::InvalidSignature) => {
            warn!("webhook rejected: invalid signature");
            // Generic body: no detail for unauthenticated callers
            (StatusCode::UNAUTHORIZED, "Invalid signature").into_response()
        }
        Err(WebhookError::MalformedNotification { message }) => {
            warn!(%message, "webhook rejected: malformed notification");
            (StatusCode::BAD_REQUEST, "Malformed notification").into_response()
        }
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "webhook processing failed, requesting redelivery");
            (StatusCode::SERVICE_UNAVAILABLE, "Temporarily unavailable").into_response()
        }
        Err(e) => {
            // Permanent condition: acknowledge so the gateway stops
            // retrying, and alert through the log stream.
            error!(error = %e, "webhook permanently failed, acknowledging");
            (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
        }
    }
}
