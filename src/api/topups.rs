use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;
use crate::services::topup::StartTopup;

#[derive(Debug, Deserialize)]
pub struct CreateTopupBody {
    pub account_id: Uuid,
    pub amount: i64,
    pub idempotency_key: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopupResponse {
    pub payment_id: Uuid,
    pub account_id: Uuid,
    pub amount: i64,
    pub credits: i64,
    pub status: String,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// POST /topups
pub async fn create_topup(
    State(state): State<AppState>,
    Json(body): Json<CreateTopupBody>,
) -> Result<impl IntoResponse, AppError> {
    let started = state
        .topups
        .start_topup(StartTopup {
            account_id: body.account_id,
            amount: body.amount,
            idempotency_key: body.idempotency_key,
            note: body.note,
        })
        .await?;

    let payment = started.payment;
    Ok((
        StatusCode::CREATED,
        Json(TopupResponse {
            payment_id: payment.payment_id,
            account_id: payment.account_id,
            amount: payment.amount,
            credits: payment.credits,
            status: payment.status,
            external_reference: payment.external_reference,
            checkout_url: started.checkout_url,
        }),
    ))
}
