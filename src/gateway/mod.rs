//! Payment gateway adapter
//!
//! Creates payable gateway orders and checks the signature the gateway hands
//! the browser after a successful payment. The signature is a hex encoded
//! HMAC-SHA256 of `"{gateway_order_id}|{gateway_payment_id}"` keyed with the
//! merchant secret.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub mod razorpay;

pub use razorpay::{RazorpayConfig, RazorpayGateway};

type HmacSha256 = Hmac<Sha256>;

/// An order created on the gateway side; `amount` is in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid signing key")]
    InvalidKey,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError>;

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;
}

pub fn sign(secret: &[u8], gateway_order_id: &str, gateway_payment_id: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| GatewayError::InvalidKey)?;
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Malformed hex never verifies.
pub fn verify(secret: &[u8], gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else { return false };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else { return false };
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}
