//! Payment gateway integration.
//!
//! [`PaymentGateway`] is the seam the payment service talks to;
//! [`razorpay::RazorpayClient`] implements it over the gateway's REST API.
//! Checkout signatures are verified locally with HMAC-SHA256.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::errors::ServiceError;

pub mod razorpay;

pub use razorpay::RazorpayClient;

type HmacSha256 = Hmac<Sha256>;

/// 10,00,000 rupees
pub const MAX_AMOUNT_PAISE: i64 = 100_000_000;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(String),
    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// The gateway answers unknown ids with 400 or 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Api { status: 400 | 404, .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Http(err.to_string())
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        ServiceError::ExternalServiceError(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayOrder {
    /// Amount in paise
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub payment_capture: u8,
    pub notes: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: i64,
    pub payment_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the checkout widget.
    fn key_id(&self) -> String;

    async fn create_order(&self, request: CreateGatewayOrder) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    /// Full refund when `amount` is `None`.
    async fn refund(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<GatewayRefund, GatewayError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let expected = payment_signature(secret, order_id, payment_id);
    !expected.is_empty() && constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Converts rupees to paise, enforcing the checkout limits.
pub fn amount_to_paise(amount: Decimal) -> Result<i64, ServiceError> {
    if amount < Decimal::ONE {
        return Err(ServiceError::BadRequest(
            "Amount must be at least ₹1".to_string(),
        ));
    }

    let paise = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX);
    if paise > MAX_AMOUNT_PAISE {
        return Err(ServiceError::BadRequest(
            "Amount exceeds maximum limit of ₹10,00,000".to_string(),
        ));
    }
    Ok(paise)
}

pub fn paise_to_amount(paise: i64) -> Decimal {
    Decimal::new(paise, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signature_matches_known_vector() {
        let sig = payment_signature("secret", "order_ABC", "pay_XYZ");
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature("secret", "order_ABC", "pay_XYZ", &sig));
        assert!(!verify_payment_signature("other", "order_ABC", "pay_XYZ", &sig));
        assert!(!verify_payment_signature("secret", "order_ABC", "pay_XYZ", "deadbeef"));
    }

    #[test]
    fn tampering_with_either_id_breaks_the_signature() {
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert!(!verify_payment_signature("secret", "order_2", "pay_1", &sig));
        assert!(!verify_payment_signature("secret", "order_1", "pay_2", &sig));
    }

    #[test]
    fn amount_limits() {
        assert!(amount_to_paise(dec!(0.99)).is_err());
        assert_eq!(amount_to_paise(dec!(1)).unwrap(), 100);
        assert_eq!(amount_to_paise(dec!(499.995)).unwrap(), 50_000);
        assert_eq!(amount_to_paise(dec!(1000000)).unwrap(), MAX_AMOUNT_PAISE);
        assert!(amount_to_paise(dec!(1000000.01)).is_err());
    }

    #[test]
    fn paise_round_trip_for_display() {
        assert_eq!(paise_to_amount(12_345), dec!(123.45));
    }

    #[test]
    fn not_found_detection() {
        let err = GatewayError::Api {
            status: 400,
            message: "The id provided does not exist".into(),
        };
        assert!(err.is_not_found());
        assert!(!GatewayError::Http("timeout".into()).is_not_found());
    }
}
