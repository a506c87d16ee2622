use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a hosted checkout for a top-up
#[derive(Debug, Clone, Serialize)]
pub struct CreateTopupRequest {
    /// Owning credit account, carried as checkout metadata
    pub account_id: Uuid,
    /// Amount charged, in the smallest currency unit
    pub amount: i64,
    /// Credits granted on approval; must equal `amount`
    pub credits: i64,
    /// Client-supplied idempotency key, also the source of the
    /// external reference
    pub idempotency_key: String,
    /// Short description shown on the checkout page
    pub title: String,
}

/// A checkout preference created at the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupCheckout {
    pub preference_id: String,
    pub checkout_url: String,
    pub external_reference: String,
}

/// A payment as reported by the gateway
#[derive(Debug, Clone)]
pub struct GatewayPaymentView {
    pub gateway_payment_id: String,
    pub status: GatewayPaymentStatus,
    pub external_reference: Option<String>,
}

/// Gateway-side payment status, collapsed to the states the ledger
/// reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    Pending,
    InProcess,
    Unknown,
}

impl GatewayPaymentStatus {
    pub fn from_gateway_str(status: &str) -> Self {
        match status {
            "approved" => GatewayPaymentStatus::Approved,
            "rejected" => GatewayPaymentStatus::Rejected,
            "cancelled" => GatewayPaymentStatus::Cancelled,
            "pending" => GatewayPaymentStatus::Pending,
            "in_process" | "in_mediation" | "authorized" => GatewayPaymentStatus::InProcess,
            _ => GatewayPaymentStatus::Unknown,
        }
    }

    /// True when the gateway will never change this status again
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            GatewayPaymentStatus::Approved
                | GatewayPaymentStatus::Rejected
                | GatewayPaymentStatus::Cancelled
        )
    }
}
