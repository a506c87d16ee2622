//! Webhook notification processing.
//!
//! Turns gateway payment notifications into ledger transitions and
//! account credits. The processor never trusts the notification body for
//! anything beyond the payment id; the authoritative status is always
//! re-fetched from the gateway before any state changes.
//!
//! At-most-once crediting is enforced by the ledger's conditional
//! pending -> approved transition: of any number of concurrent
//! deliveries for the same payment, exactly one observes
//! `ApprovalOutcome::Approved` and performs the credit.

use crate::database::payment_repository::Payment;
use crate::database::repository::{ApprovalOutcome, LedgerError, PaymentStore};
use crate::gateway::{
    external_reference, GatewayError, GatewayPaymentStatus, PaymentGateway, SignatureValidator,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Accepted outcomes of processing one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment was approved and the account credited
    Credited {
        payment_id: Uuid,
        account_id: Uuid,
        credits: i64,
        new_balance: i64,
    },
    /// The payment was rejected or cancelled at the gateway
    Rejected { payment_id: Uuid },
    /// A duplicate delivery for a payment already handled
    AlreadyProcessed { payment_id: Uuid },
    /// Nothing to do: non-payment notification, or a status the ledger
    /// does not react to yet
    Ignored,
}

/// Failure modes of webhook processing
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed notification: {message}")]
    MalformedNotification { message: String },

    #[error("gateway unavailable: {source}")]
    GatewayUnavailable { source: GatewayError },

    #[error("gateway payment not found: {gateway_payment_id}")]
    UnknownGatewayPayment { gateway_payment_id: String },

    #[error("no ledger entry for external reference: {external_reference}")]
    LedgerEntryMissing { external_reference: String },

    #[error(transparent)]
    Store(#[from] LedgerError),
}

impl WebhookError {
    /// Whether the gateway should redeliver this notification.
    /// Permanent conditions must not be retried; they are surfaced
    /// through logging instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::InvalidSignature => false,
            WebhookError::MalformedNotification { .. } => false,
            WebhookError::GatewayUnavailable { source } => source.is_retryable(),
            WebhookError::UnknownGatewayPayment { .. } => false,
            WebhookError::LedgerEntryMissing { .. } => false,
            WebhookError::Store(err) => err.is_retryable(),
        }
    }
}

/// Incoming notification envelope. Only the shape needed to locate the
/// payment; everything else comes from the gateway status fetch.
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    id: Option<serde_json::Value>,
}

impl Notification {
    /// Data ids arrive as strings or numbers depending on the
    /// notification channel.
    fn data_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct WebhookProcessor {
    validator: SignatureValidator,
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentStore>,
}

impl WebhookProcessor {
    pub fn new(
        validator: SignatureValidator,
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentStore>,
    ) -> Self {
        Self {
            validator,
            gateway,
            payments,
        }
    }

    /// Process one raw notification delivery.
    ///
    /// `signature_header` is the raw `x-signature` value and
    /// `request_id` the `x-request-id` value; both participate in
    /// signature verification and a missing header rejects the
    /// delivery outright.
    pub async fn process(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
        request_id: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let notification: Notification =
            serde_json::from_slice(raw_body).map_err(|e| WebhookError::MalformedNotification {
                message: format!("invalid JSON body: {}", e),
            })?;

        let data_id = notification.data_id();

        // Fail closed: no header means no verification means no entry.
        let header = signature_header.ok_or(WebhookError::InvalidSignature)?;
        if !self.validator.verify(header, data_id.as_deref(), request_id) {
            return Err(WebhookError::InvalidSignature);
        }

        if notification.kind != "payment" {
            info!(kind = %notification.kind, "ignoring non-payment notification");
            return Ok(WebhookOutcome::Ignored);
        }

        let gateway_payment_id = data_id.ok_or(WebhookError::MalformedNotification {
            message: "payment notification without data.id".to_string(),
        })?;

        // Authoritative status comes from the gateway, never the body.
        let view = self
            .gateway
            .fetch_status(&gateway_payment_id)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { payment_id } => WebhookError::UnknownGatewayPayment {
                    gateway_payment_id: payment_id,
                },
                other => WebhookError::GatewayUnavailable { source: other },
            })?;

        let reference =
            view.external_reference
                .as_deref()
                .ok_or_else(|| WebhookError::LedgerEntryMissing {
                    external_reference: String::new(),
                })?;

        let payment = self
            .payments
            .find_by_external_reference(reference)
            .await?
            .ok_or_else(|| WebhookError::LedgerEntryMissing {
                external_reference: reference.to_string(),
            })?;

        // Guard against a reference collision: the reference on file must
        // be the canonical derivation of this payment's idempotency key.
        if payment.external_reference != external_reference(&payment.idempotency_key) {
            return Err(WebhookError::LedgerEntryMissing {
                external_reference: reference.to_string(),
            });
        }

        // Terminal payments absorb every further delivery without any
        // mutation, not even a gateway-id attach.
        if payment.state().is_terminal() {
            info!(
                payment_id = %payment.payment_id,
                status = %payment.status,
                "duplicate delivery for settled payment"
            );
            return Ok(WebhookOutcome::AlreadyProcessed {
                payment_id: payment.payment_id,
            });
        }

        // Record the gateway payment id as soon as it is known so the
        // reconciliation sweep can poll this payment later.
        let payment = self
            .payments
            .attach_gateway_ids(payment.payment_id, Some(&view.gateway_payment_id), None)
            .await?;

        match view.status {
            GatewayPaymentStatus::Approved => self.handle_approved(payment).await,
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                self.handle_rejected(payment, view.status).await
            }
            GatewayPaymentStatus::Pending
            | GatewayPaymentStatus::InProcess
            | GatewayPaymentStatus::Unknown => {
                info!(
                    payment_id = %payment.payment_id,
                    status = ?view.status,
                    "gateway status not actionable yet"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn handle_approved(&self, payment: Payment) -> Result<WebhookOutcome, WebhookError> {
        match self
            .payments
            .try_transition_to_approved(payment.payment_id)
            .await?
        {
            ApprovalOutcome::Approved => {
                let applied = self.payments.credit_approved(payment.payment_id).await?;

                info!(
                    payment_id = %payment.payment_id,
                    account_id = %applied.account_id,
                    credits = applied.credits,
                    new_balance = applied.new_balance,
                    "payment credited"
                );

                Ok(WebhookOutcome::Credited {
                    payment_id: payment.payment_id,
                    account_id: applied.account_id,
                    credits: applied.credits,
                    new_balance: applied.new_balance,
                })
            }
            ApprovalOutcome::AlreadyDone => {
                info!(
                    payment_id = %payment.payment_id,
                    "duplicate delivery for already-handled payment"
                );
                Ok(WebhookOutcome::AlreadyProcessed {
                    payment_id: payment.payment_id,
                })
            }
            ApprovalOutcome::Conflict => {
                // Benign race: another path already advanced the payment.
                // Terminal states absorb the event.
                warn!(
                    payment_id = %payment.payment_id,
                    status = %payment.status,
                    "gateway approval raced with a conflicting transition"
                );
                Ok(WebhookOutcome::AlreadyProcessed {
                    payment_id: payment.payment_id,
                })
            }
        }
    }

    async fn handle_rejected(
        &self,
        payment: Payment,
        status: GatewayPaymentStatus,
    ) -> Result<WebhookOutcome, WebhookError> {
        if payment.state().is_terminal() {
            return Ok(WebhookOutcome::AlreadyProcessed {
                payment_id: payment.payment_id,
            });
        }

        let reason = match status {
            GatewayPaymentStatus::Cancelled => "cancelled",
            _ => "rejected",
        };

        match self.payments.mark_rejected(payment.payment_id, reason).await {
            Ok(payment) => {
                info!(payment_id = %payment.payment_id, reason, "payment rejected");
                Ok(WebhookOutcome::Rejected {
                    payment_id: payment.payment_id,
                })
            }
            Err(LedgerError::UnexpectedState { payment_id, status }) => {
                // Raced with an approval; the payment is past rejection.
                warn!(
                    %payment_id,
                    %status,
                    "gateway rejection raced with a conflicting transition"
                );
                Ok(WebhookOutcome::AlreadyProcessed { payment_id })
            }
            Err(other) => Err(other.into()),
        }
    }
}
