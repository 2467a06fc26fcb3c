//! Razorpay orders API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

use super::{verify, GatewayError, GatewayOrder, PaymentGateway};

pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// API root, e.g. `"https://api.razorpay.com"`.
    pub base_url: String,
}

impl fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
    http: Client,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self { config, http: Client::new() }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderBody { amount: amount_minor, currency, receipt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, body });
        }

        let order: GatewayOrder = response.json().await?;
        debug!(gateway_order_id = %order.id, "gateway order created");
        Ok(order)
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        verify(self.config.key_secret.as_bytes(), gateway_order_id, gateway_payment_id, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::sign;

    #[test]
    fn test_debug_redacts_secret() {
        let config = RazorpayConfig { key_id: "rzp_test_1".into(), key_secret: "hunter2".into(), base_url: DEFAULT_BASE_URL.into() };
        let rendered = format!("{:?}", RazorpayGateway::new(config));
        assert!(rendered.contains("rzp_test_1"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_verifies_with_key_secret() {
        let gateway = RazorpayGateway::new(RazorpayConfig { key_id: "id".into(), key_secret: "hunter2".into(), base_url: DEFAULT_BASE_URL.into() });
        let signature = sign(b"hunter2", "order_1", "pay_1").unwrap();
        assert!(gateway.verify_signature("order_1", "pay_1", &signature));
        let mut tampered = signature.clone();
        tampered.replace_range(0..1, if signature.starts_with('0') { "1" } else { "0" });
        assert!(!gateway.verify_signature("order_1", "pay_1", &tampered));
    }
}
