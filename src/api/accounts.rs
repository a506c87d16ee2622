use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::database::account_repository::CreditAccount;
use crate::database::repository::LedgerError;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

impl From<CreditAccount> for AccountResponse {
    fn from(account: CreditAccount) -> Self {
        Self {
            account_id: account.account_id,
            balance: account.balance,
            total_earned: account.total_earned,
            total_spent: account.total_spent,
        }
    }
}

/// POST /accounts
pub async fn create_account(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.accounts.create_account().await?;
    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .find_by_id(account_id)
        .await?
        .ok_or(LedgerError::AccountNotFound { account_id })?;

    Ok(Json(AccountResponse::from(account)))
}
