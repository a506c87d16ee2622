//! Storage contracts for the payment ledger and credit accounts.
//!
//! Every state transition and balance mutation goes through these traits as
//! a conditionally-guarded operation (compare-and-swap on payment status,
//! atomic increment on balance). Application code never does a
//! read-then-write on either field.

use crate::database::account_repository::CreditAccount;
use crate::database::error::DatabaseError;
use crate::database::payment_repository::Payment;
use crate::error::{AppError, AppErrorKind, DomainError};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Fields supplied when creating a top-up payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub account_id: Uuid,
    pub amount: i64,
    pub credits: i64,
    pub idempotency_key: String,
    pub note: Option<String>,
}

/// Result of the conditional pending -> approved transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// This caller won the race and owns the credit step
    Approved,
    /// Payment was already approved or credited by an earlier delivery
    AlreadyDone,
    /// Payment moved to a conflicting state (e.g. rejected) concurrently
    Conflict,
}

/// Result of applying the credit for an approved payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditApplied {
    pub account_id: Uuid,
    pub credits: i64,
    pub new_balance: i64,
}

/// Errors surfaced by the ledger and account stores
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance on account {account_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        account_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: Uuid },

    #[error("payment not found: {payment_id}")]
    PaymentNotFound { payment_id: Uuid },

    #[error("payment {payment_id} in unexpected state: {status}")]
    UnexpectedState { payment_id: Uuid, status: String },

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                available,
                requested,
                ..
            } => AppError::new(AppErrorKind::Domain(DomainError::InsufficientBalance {
                available,
                required: requested,
            })),
            LedgerError::AccountNotFound { account_id } => {
                AppError::new(AppErrorKind::Domain(DomainError::AccountNotFound {
                    account_id: account_id.to_string(),
                }))
            }
            LedgerError::PaymentNotFound { payment_id } => {
                AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
                    reference: payment_id.to_string(),
                }))
            }
            LedgerError::UnexpectedState { status, .. } => AppError::new(AppErrorKind::Domain(
                DomainError::InvalidStateTransition {
                    from: status,
                    to: "requested transition".to_string(),
                },
            )),
            LedgerError::Storage(err) => err.into(),
        }
    }
}

/// The payment ledger: single point of truth for "has this payment been credited"
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Create a payment in the `new` state. Idempotent per idempotency key:
    /// a second call with the same key returns the existing payment.
    async fn create(&self, new: NewPayment) -> Result<Payment, LedgerError>;

    /// The sole lookup path used by webhook processing.
    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<Payment>, LedgerError>;

    /// Record gateway-side identifiers as they become known.
    async fn attach_gateway_ids(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<&str>,
        gateway_preference_id: Option<&str>,
    ) -> Result<Payment, LedgerError>;

    /// new -> pending, once a checkout preference exists.
    async fn mark_pending(
        &self,
        payment_id: Uuid,
        checkout_url: &str,
    ) -> Result<Payment, LedgerError>;

    /// Compare-and-swap: set status=approved only if the persisted status
    /// is still pending. Exactly one concurrent caller may observe
    /// `Approved` for a given payment.
    async fn try_transition_to_approved(
        &self,
        payment_id: Uuid,
    ) -> Result<ApprovalOutcome, LedgerError>;

    /// approved -> credited together with the balance increment, as one
    /// atomic storage operation: either both the status flip and the
    /// account credit land, or neither does. A partial failure can
    /// therefore never leave a credited balance behind an `approved`
    /// payment, and retrying after an error applies the credit at most
    /// once. Idempotent for already-credited payments (returns the
    /// current balance, no increment).
    async fn credit_approved(&self, payment_id: Uuid) -> Result<CreditApplied, LedgerError>;

    /// pending -> rejected (terminal).
    async fn mark_rejected(&self, payment_id: Uuid, reason: &str) -> Result<Payment, LedgerError>;

    /// Payments stuck in `approved` longer than `older_than_secs`
    /// (a crash between the CAS and the credit step).
    async fn find_stuck_approved(&self, older_than_secs: i64)
        -> Result<Vec<Payment>, LedgerError>;

    /// Pending payments with a known gateway payment id that have not been
    /// touched for `older_than_secs`, candidates for status polling.
    async fn find_stale_pending(&self, older_than_secs: i64) -> Result<Vec<Payment>, LedgerError>;
}

/// Credit account balances with atomic increment semantics
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self) -> Result<CreditAccount, LedgerError>;

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<CreditAccount>, LedgerError>;

    /// Atomically add `amount` to balance and total_earned; returns the new balance.
    async fn credit(&self, account_id: Uuid, amount: i64) -> Result<i64, LedgerError>;

    /// Atomically subtract `amount` from balance and add it to total_spent;
    /// fails with `InsufficientBalance` rather than letting balance go negative.
    async fn debit(&self, account_id: Uuid, amount: i64) -> Result<i64, LedgerError>;
}
