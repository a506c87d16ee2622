use crate::config::GatewayConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::GatewayHttpClient;
use crate::gateway::types::{
    CreateTopupRequest, GatewayPaymentStatus, GatewayPaymentView, TopupCheckout,
};
use crate::gateway::{external_reference, PaymentGateway};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// HTTP client for the checkout-preference payment gateway.
///
/// Creates hosted checkouts and fetches payment status. Every checkout
/// carries an external reference derived from the idempotency key, and
/// the creation request itself is deduplicated gateway-side via the
/// `X-Idempotency-Key` header.
pub struct TopupGatewayClient {
    http: GatewayHttpClient,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    external_reference: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    external_reference: Option<String>,
}

impl TopupGatewayClient {
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let http = GatewayHttpClient::new(
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for TopupGatewayClient {
    async fn create_topup(&self, request: &CreateTopupRequest) -> GatewayResult<TopupCheckout> {
        if request.amount <= 0 {
            return Err(GatewayError::InvalidResponse {
                message: format!("top-up amount must be positive, got {}", request.amount),
            });
        }
        if request.amount != request.credits {
            return Err(GatewayError::InvalidResponse {
                message: format!(
                    "amount {} does not match credits {}",
                    request.amount, request.credits
                ),
            });
        }

        let reference = external_reference(&request.idempotency_key);
        let body = json!({
            "items": [{
                "title": request.title,
                "quantity": 1,
                "unit_price": request.amount,
            }],
            "external_reference": reference,
            "metadata": {
                "account_id": request.account_id,
            },
        });

        let url = format!("{}/checkout/preferences", self.base_url);
        let response: PreferenceResponse = self
            .http
            .request_json(
                Method::POST,
                &url,
                &self.access_token,
                Some(&body),
                &[("X-Idempotency-Key", request.idempotency_key.as_str())],
            )
            .await?;

        info!(
            preference_id = %response.id,
            external_reference = %response.external_reference,
            "created checkout preference"
        );

        Ok(TopupCheckout {
            preference_id: response.id,
            checkout_url: response.init_point,
            external_reference: response.external_reference,
        })
    }

    async fn fetch_status(&self, gateway_payment_id: &str) -> GatewayResult<GatewayPaymentView> {
        let url = format!("{}/v1/payments/{}", self.base_url, gateway_payment_id);
        let response: PaymentResponse = self
            .http
            .request_json(Method::GET, &url, &self.access_token, None, &[])
            .await?;

        // The gateway serializes payment ids as numbers; webhook data ids
        // arrive as strings. Normalize to string here.
        let id = match &response.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(GatewayError::InvalidResponse {
                    message: format!("unexpected payment id shape: {}", other),
                })
            }
        };

        Ok(GatewayPaymentView {
            gateway_payment_id: id,
            status: GatewayPaymentStatus::from_gateway_str(&response.status),
            external_reference: response.external_reference,
        })
    }
}
