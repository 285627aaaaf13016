use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    verify_payment_signature, CreateGatewayOrder, GatewayError, GatewayOrder, GatewayPayment,
    GatewayRefund, PaymentGateway,
};

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com/v1";

/// REST client for the Razorpay v1 API (HTTP basic auth with key id and secret).
#[derive(Debug, Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: String,
}

impl RazorpayClient {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Builds a client when both credentials are configured.
    pub fn from_config(cfg: &crate::config::AppConfig) -> Option<Result<Self, GatewayError>> {
        cfg.razorpay_credentials()
            .map(|(key_id, secret)| Self::new(cfg.razorpay_api_base.clone(), key_id, secret))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|env| env.error.description)
            .unwrap_or(text);
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    #[instrument(skip(self, request), fields(amount = request.amount, receipt = %request.receipt))]
    async fn create_order(&self, request: CreateGatewayOrder) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .http
            .post(self.url("/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;
        let order: GatewayOrder = Self::read(response).await?;
        debug!(gateway_order_id = %order.id, "gateway order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/payments/{}", payment_id)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<GatewayRefund, GatewayError> {
        let body = match amount {
            Some(amount) => serde_json::json!({ "amount": amount }),
            None => serde_json::json!({}),
        };
        let response = self
            .http
            .post(self.url(&format!("/payments/{}/refund", payment_id)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::payment_signature;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RazorpayClient {
        RazorpayClient::new(server.uri(), "rzp_test_key", "test_secret").unwrap()
    }

    #[tokio::test]
    async fn creates_orders_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({ "amount": 49900, "currency": "INR" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_Test123",
                "entity": "order",
                "amount": 49900,
                "amount_paid": 0,
                "amount_due": 49900,
                "currency": "INR",
                "receipt": "rcpt_1",
                "status": "created",
                "created_at": 1_700_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = client(&server)
            .create_order(CreateGatewayOrder {
                amount: 49900,
                currency: "INR".into(),
                receipt: "rcpt_1".into(),
                payment_capture: 1,
                notes: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(order.id, "order_Test123");
        assert_eq!(order.status, "created");
    }

    #[tokio::test]
    async fn api_errors_carry_the_gateway_description() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/pay_missing"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": "BAD_REQUEST_ERROR", "description": "The id provided does not exist" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_payment("pay_missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn refunds_post_the_requested_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments/pay_1/refund"))
            .and(body_partial_json(json!({ "amount": 1000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rfnd_1", "amount": 1000, "payment_id": "pay_1", "status": "processed"
            })))
            .mount(&server)
            .await;

        let refund = client(&server).refund("pay_1", Some(1000)).await.unwrap();
        assert_eq!(refund.id, "rfnd_1");
        assert_eq!(refund.amount, 1000);
    }

    #[test]
    fn verifies_signatures_with_the_key_secret() {
        let client = RazorpayClient::new(DEFAULT_API_BASE, "rzp_test_key", "test_secret").unwrap();
        let sig = payment_signature("test_secret", "order_1", "pay_1");
        assert!(client.verify_signature("order_1", "pay_1", &sig));
        assert!(!client.verify_signature("order_1", "pay_2", &sig));
    }
}
