//! In-memory test doubles for the storage traits and the payment
//! gateway, preserving the same conditional-update semantics as the
//! Postgres implementations.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use topup_reconciler::database::account_repository::CreditAccount;
use topup_reconciler::database::error::{DatabaseError, DatabaseErrorKind};
use topup_reconciler::database::payment_repository::{Payment, PaymentStatus};
use topup_reconciler::database::repository::{
    AccountStore, ApprovalOutcome, CreditApplied, LedgerError, NewPayment, PaymentStore,
};
use topup_reconciler::gateway::{
    external_reference, CreateTopupRequest, GatewayError, GatewayPaymentStatus,
    GatewayPaymentView, GatewayResult, PaymentGateway, TopupCheckout,
};

// ---------------------------------------------------------------------------
// Payment ledger double
// ---------------------------------------------------------------------------

pub struct MemoryLedger {
    payments: Mutex<HashMap<Uuid, Payment>>,
    accounts: Arc<MemoryAccounts>,
    fail_next_credit: AtomicBool,
}

impl MemoryLedger {
    /// The ledger holds the account store because `credit_approved`
    /// mutates both as one operation, like the Postgres transaction.
    pub fn new(accounts: Arc<MemoryAccounts>) -> Self {
        Self {
            payments: Mutex::new(HashMap::new()),
            accounts,
            fail_next_credit: AtomicBool::new(false),
        }
    }

    /// Make the next `credit_approved` call fail with a retryable
    /// storage error, leaving payment and balance untouched.
    pub fn fail_next_credit(&self) {
        self.fail_next_credit.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, payment_id: Uuid) -> Option<Payment> {
        self.payments.lock().unwrap().get(&payment_id).cloned()
    }

    pub fn status_of(&self, payment_id: Uuid) -> String {
        self.get(payment_id).map(|p| p.status).unwrap_or_default()
    }

    /// Backdate a payment's approval so the sweep picks it up.
    pub fn backdate_approved(&self, payment_id: Uuid, secs: i64) {
        let mut payments = self.payments.lock().unwrap();
        if let Some(p) = payments.get_mut(&payment_id) {
            p.approved_at = Some(Utc::now() - Duration::seconds(secs));
        }
    }

    /// Backdate a payment's last update so the sweep polls it.
    pub fn backdate_updated(&self, payment_id: Uuid, secs: i64) {
        let mut payments = self.payments.lock().unwrap();
        if let Some(p) = payments.get_mut(&payment_id) {
            p.updated_at = Utc::now() - Duration::seconds(secs);
        }
    }

    /// Force a payment into a specific status, for setting up scenarios.
    pub fn force_status(&self, payment_id: Uuid, status: &str) {
        let mut payments = self.payments.lock().unwrap();
        if let Some(p) = payments.get_mut(&payment_id) {
            p.status = status.to_string();
            if status == "approved" {
                p.approved_at = Some(Utc::now());
            }
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryLedger {
    async fn create(&self, new: NewPayment) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.lock().unwrap();

        if let Some(existing) = payments
            .values()
            .find(|p| p.idempotency_key == new.idempotency_key)
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            account_id: new.account_id,
            amount: new.amount,
            credits: new.credits,
            status: "new".to_string(),
            idempotency_key: new.idempotency_key.clone(),
            external_reference: external_reference(&new.idempotency_key),
            gateway_payment_id: None,
            gateway_preference_id: None,
            note: new.note,
            metadata: json!({}),
            approved_at: None,
            credited_at: None,
            created_at: now,
            updated_at: now,
        };
        payments.insert(payment.payment_id, payment.clone());
        Ok(payment)
    }

    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .find(|p| p.external_reference == external_reference)
            .cloned())
    }

    async fn attach_gateway_ids(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<&str>,
        gateway_preference_id: Option<&str>,
    ) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { payment_id })?;

        if let Some(id) = gateway_payment_id {
            payment.gateway_payment_id = Some(id.to_string());
        }
        if let Some(id) = gateway_preference_id {
            payment.gateway_preference_id = Some(id.to_string());
        }
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn mark_pending(
        &self,
        payment_id: Uuid,
        checkout_url: &str,
    ) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { payment_id })?;

        if payment.status == "new" {
            payment.status = "pending".to_string();
            payment.metadata["checkout_url"] = json!(checkout_url);
            payment.updated_at = Utc::now();
        }
        Ok(payment.clone())
    }

    async fn try_transition_to_approved(
        &self,
        payment_id: Uuid,
    ) -> Result<ApprovalOutcome, LedgerError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { payment_id })?;

        match payment.state() {
            PaymentStatus::Pending => {
                payment.status = "approved".to_string();
                payment.approved_at = Some(Utc::now());
                payment.updated_at = Utc::now();
                Ok(ApprovalOutcome::Approved)
            }
            PaymentStatus::Approved | PaymentStatus::Credited => Ok(ApprovalOutcome::AlreadyDone),
            _ => Ok(ApprovalOutcome::Conflict),
        }
    }

    async fn credit_approved(&self, payment_id: Uuid) -> Result<CreditApplied, LedgerError> {
        if self.fail_next_credit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage(DatabaseError::new(
                DatabaseErrorKind::Connection {
                    message: "pool timed out".to_string(),
                },
            )));
        }

        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { payment_id })?;

        match payment.state() {
            PaymentStatus::Approved => {
                let mut accounts = self.accounts.accounts.lock().unwrap();
                let account = accounts.get_mut(&payment.account_id).ok_or(
                    LedgerError::AccountNotFound {
                        account_id: payment.account_id,
                    },
                )?;
                account.balance += payment.credits;
                account.total_earned += payment.credits;
                account.updated_at = Utc::now();

                payment.status = "credited".to_string();
                payment.credited_at = Some(Utc::now());
                payment.updated_at = Utc::now();

                Ok(CreditApplied {
                    account_id: payment.account_id,
                    credits: payment.credits,
                    new_balance: account.balance,
                })
            }
            PaymentStatus::Credited => Ok(CreditApplied {
                account_id: payment.account_id,
                credits: payment.credits,
                new_balance: self.accounts.balance_of(payment.account_id),
            }),
            _ => Err(LedgerError::UnexpectedState {
                payment_id,
                status: payment.status.clone(),
            }),
        }
    }

    async fn mark_rejected(&self, payment_id: Uuid, reason: &str) -> Result<Payment, LedgerError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { payment_id })?;

        match payment.state() {
            PaymentStatus::New | PaymentStatus::Pending => {
                payment.status = "rejected".to_string();
                payment.metadata["rejection_reason"] = json!(reason);
                payment.updated_at = Utc::now();
                Ok(payment.clone())
            }
            PaymentStatus::Rejected => Ok(payment.clone()),
            _ => Err(LedgerError::UnexpectedState {
                payment_id,
                status: payment.status.clone(),
            }),
        }
    }

    async fn find_stuck_approved(
        &self,
        older_than_secs: i64,
    ) -> Result<Vec<Payment>, LedgerError> {
        let cutoff = Utc::now() - Duration::seconds(older_than_secs);
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.status == "approved" && p.approved_at.map(|at| at < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn find_stale_pending(&self, older_than_secs: i64) -> Result<Vec<Payment>, LedgerError> {
        let cutoff = Utc::now() - Duration::seconds(older_than_secs);
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.status == "pending"
                    && p.gateway_payment_id.is_some()
                    && p.updated_at < cutoff
            })
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Account store double
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAccounts {
    accounts: Mutex<HashMap<Uuid, CreditAccount>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account_id: Uuid) -> i64 {
        self.accounts
            .lock()
            .unwrap()
            .get(&account_id)
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    pub fn get(&self, account_id: Uuid) -> Option<CreditAccount> {
        self.accounts.lock().unwrap().get(&account_id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn create_account(&self) -> Result<CreditAccount, LedgerError> {
        let now = Utc::now();
        let account = CreditAccount {
            account_id: Uuid::new_v4(),
            balance: 0,
            total_earned: 0,
            total_spent: 0,
            created_at: now,
            updated_at: now,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(account.account_id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<CreditAccount>, LedgerError> {
        Ok(self.accounts.lock().unwrap().get(&account_id).cloned())
    }

    async fn credit(&self, account_id: Uuid, amount: i64) -> Result<i64, LedgerError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound { account_id })?;
        account.balance += amount;
        account.total_earned += amount;
        account.updated_at = Utc::now();
        Ok(account.balance)
    }

    async fn debit(&self, account_id: Uuid, amount: i64) -> Result<i64, LedgerError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound { account_id })?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account_id,
                available: account.balance,
                requested: amount,
            });
        }
        account.balance -= amount;
        account.total_spent += amount;
        account.updated_at = Utc::now();
        Ok(account.balance)
    }
}

// ---------------------------------------------------------------------------
// Gateway double
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubGateway {
    fetch_responses: Mutex<HashMap<String, GatewayResult<GatewayPaymentView>>>,
    pub create_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a fetch_status response for a gateway payment id.
    pub fn set_payment(&self, gateway_payment_id: &str, status: GatewayPaymentStatus, reference: &str) {
        self.fetch_responses.lock().unwrap().insert(
            gateway_payment_id.to_string(),
            Ok(GatewayPaymentView {
                gateway_payment_id: gateway_payment_id.to_string(),
                status,
                external_reference: Some(reference.to_string()),
            }),
        );
    }

    pub fn set_fetch_error(&self, gateway_payment_id: &str, error: GatewayError) {
        self.fetch_responses
            .lock()
            .unwrap()
            .insert(gateway_payment_id.to_string(), Err(error));
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_topup(&self, request: &CreateTopupRequest) -> GatewayResult<TopupCheckout> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let reference = external_reference(&request.idempotency_key);
        Ok(TopupCheckout {
            preference_id: format!("pref-{}", request.idempotency_key),
            checkout_url: format!("https://checkout.test/{}", request.idempotency_key),
            external_reference: reference,
        })
    }

    async fn fetch_status(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPaymentView> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_responses
            .lock()
            .unwrap()
            .get(gateway_payment_id)
            .cloned()
            .unwrap_or(Err(GatewayError::NotFound {
                payment_id: gateway_payment_id.to_string(),
            }))
    }
}

// ---------------------------------------------------------------------------
// Webhook helpers
// ---------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

/// Build a valid `x-signature` header for a notification.
pub fn sign_notification(secret: &str, data_id: Option<&str>, request_id: &str) -> String {
    let ts = Utc::now().timestamp().to_string();
    let manifest = match data_id {
        Some(id) => format!("id:{};request-id:{};ts:{};", id, request_id, ts),
        None => format!("request-id:{};ts:{};", request_id, ts),
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(manifest.as_bytes());
    format!("ts={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

/// A payment notification body as delivered by the gateway.
pub fn payment_notification(data_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "payment",
        "data": { "id": data_id }
    }))
    .unwrap()
}
