pub mod client;
pub mod error;
pub mod http;
pub mod signature;
pub mod types;

pub use client::TopupGatewayClient;
pub use error::{GatewayError, GatewayResult};
pub use signature::SignatureValidator;
pub use types::{CreateTopupRequest, GatewayPaymentStatus, GatewayPaymentView, TopupCheckout};

use async_trait::async_trait;

/// Derive the external reference attached to a checkout from its
/// idempotency key. This is the join key between the local ledger and
/// gateway-side payments; both sides must compute it identically.
pub fn external_reference(idempotency_key: &str) -> String {
    format!("topup_{}", idempotency_key)
}

/// Payment gateway abstraction
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout for a top-up.
    async fn create_topup(&self, request: &CreateTopupRequest) -> GatewayResult<TopupCheckout>;

    /// Fetch the current status of a gateway-side payment.
    /// Distinguishes `GatewayError::NotFound` from retryable failures.
    async fn fetch_status(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPaymentView>;
}
