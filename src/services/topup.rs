//! Top-up initiation.
//!
//! Creates the ledger entry and the gateway checkout for a credit
//! top-up. The whole flow is idempotent per idempotency key: a retried
//! request returns the existing payment and, if a checkout already
//! exists, does not call the gateway again.

use crate::database::payment_repository::{Payment, PaymentStatus};
use crate::database::repository::{AccountStore, LedgerError, NewPayment, PaymentStore};
use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};
use crate::gateway::{CreateTopupRequest, PaymentGateway};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A top-up ready to be paid
#[derive(Debug, Clone)]
pub struct StartedTopup {
    pub payment: Payment,
    pub checkout_url: Option<String>,
}

/// Parameters for starting a top-up
#[derive(Debug, Clone)]
pub struct StartTopup {
    pub account_id: Uuid,
    pub amount: i64,
    pub idempotency_key: String,
    pub note: Option<String>,
}

pub struct TopupService {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentStore>,
    accounts: Arc<dyn AccountStore>,
}

impl TopupService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            gateway,
            payments,
            accounts,
        }
    }

    pub async fn start_topup(&self, request: StartTopup) -> Result<StartedTopup, AppError> {
        if request.amount <= 0 {
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::InvalidAmount {
                    amount: request.amount,
                    reason: "amount must be positive".to_string(),
                },
            )));
        }
        if request.idempotency_key.trim().is_empty() {
            return Err(AppError::new(AppErrorKind::Validation(
                ValidationError::MissingField {
                    field: "idempotency_key".to_string(),
                },
            )));
        }

        self.accounts
            .find_by_id(request.account_id)
            .await
            .map_err(AppError::from)?
            .ok_or(LedgerError::AccountNotFound {
                account_id: request.account_id,
            })?;

        // Credits are granted one-to-one with the charged amount.
        let payment = self
            .payments
            .create(NewPayment {
                account_id: request.account_id,
                amount: request.amount,
                credits: request.amount,
                idempotency_key: request.idempotency_key.clone(),
                note: request.note,
            })
            .await?;

        // A retried request for a payment already past checkout creation:
        // return it as-is, including its stored checkout url.
        if payment.gateway_preference_id.is_some() || payment.state() != PaymentStatus::New {
            info!(
                payment_id = %payment.payment_id,
                status = %payment.status,
                "top-up already started, returning existing payment"
            );
            let checkout_url = stored_checkout_url(&payment);
            return Ok(StartedTopup {
                payment,
                checkout_url,
            });
        }

        let checkout = self
            .gateway
            .create_topup(&CreateTopupRequest {
                account_id: payment.account_id,
                amount: payment.amount,
                credits: payment.credits,
                idempotency_key: payment.idempotency_key.clone(),
                title: format!("Credit top-up ({} credits)", payment.credits),
            })
            .await
            .map_err(AppError::from)?;

        self.payments
            .attach_gateway_ids(payment.payment_id, None, Some(&checkout.preference_id))
            .await?;

        let payment = self
            .payments
            .mark_pending(payment.payment_id, &checkout.checkout_url)
            .await?;

        info!(
            payment_id = %payment.payment_id,
            account_id = %payment.account_id,
            amount = payment.amount,
            "top-up started"
        );

        Ok(StartedTopup {
            payment,
            checkout_url: Some(checkout.checkout_url),
        })
    }
}

fn stored_checkout_url(payment: &Payment) -> Option<String> {
    payment
        .metadata
        .get("checkout_url")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
