//! Outbound email and SMS delivery.
//!
//! Providers are reached over HTTP (JSON body, bearer API key). When no
//! provider is configured the log transports write the message to `tracing`
//! instead, which keeps local development and tests free of network calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotifyError>;
}

/// Writes emails to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotifyError> {
        info!(to = %message.to, subject = %message.subject, "email (log transport)");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotifyError> {
        info!(to = %message.to, "sms (log transport)");
        Ok(())
    }
}

/// Keeps every message in memory; useful for local tooling and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutbox {
    emails: Arc<Mutex<Vec<EmailMessage>>>,
    sms: Arc<Mutex<Vec<SmsMessage>>>,
}

impl MemoryOutbox {
    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn sms(&self) -> Vec<SmsMessage> {
        self.sms.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for MemoryOutbox {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotifyError> {
        self.emails
            .lock()
            .map_err(|_| NotifyError::Transport("outbox poisoned".into()))?
            .push(message);
        Ok(())
    }
}

#[async_trait]
impl SmsSender for MemoryOutbox {
    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotifyError> {
        self.sms
            .lock()
            .map_err(|_| NotifyError::Transport("outbox poisoned".into()))?
            .push(message);
        Ok(())
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &T,
) -> Result<(), NotifyError> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

/// Email provider reached with `POST {url}` and a JSON `{from, to, subject, html}` body.
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpEmailSender {
    pub fn new(url: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
            api_key,
            from: from.into(),
        }
    }
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotifyError> {
        let payload = EmailPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };
        post_json(&self.client, &self.url, self.api_key.as_deref(), &payload).await?;
        info!("email sent");
        Ok(())
    }
}

/// SMS provider reached with `POST {url}` and a JSON `{to, body}` body.
#[derive(Debug, Clone)]
pub struct HttpSmsSender {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSmsSender {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotifyError> {
        post_json(&self.client, &self.url, self.api_key.as_deref(), &message).await?;
        info!("sms sent");
        Ok(())
    }
}

/// Email and SMS transports used by the account flows.
#[derive(Clone)]
pub struct Notifier {
    pub email: Arc<dyn EmailSender>,
    pub sms: Arc<dyn SmsSender>,
}

impl Notifier {
    pub fn new(email: Arc<dyn EmailSender>, sms: Arc<dyn SmsSender>) -> Self {
        Self { email, sms }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let email: Arc<dyn EmailSender> = match &cfg.email_api_url {
            Some(url) => Arc::new(HttpEmailSender::new(
                url.clone(),
                cfg.email_api_key.clone(),
                cfg.email_from.clone(),
            )),
            None => Arc::new(LogEmailSender),
        };
        let sms: Arc<dyn SmsSender> = match &cfg.sms_api_url {
            Some(url) => Arc::new(HttpSmsSender::new(url.clone(), cfg.sms_api_key.clone())),
            None => Arc::new(LogSmsSender),
        };
        Self { email, sms }
    }

    pub fn memory(outbox: MemoryOutbox) -> Self {
        Self {
            email: Arc::new(outbox.clone()),
            sms: Arc::new(outbox),
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

pub fn verification_email(to: &str, name: &str, verify_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Email Verification".to_string(),
        html: format!(
            "<h2>Hi {name},</h2>\
             <p>Please verify your email by clicking the link below:</p>\
             <a href=\"{verify_url}\" target=\"_blank\">Verify Email</a>\
             <p>This link will expire in 10 minutes.</p>"
        ),
    }
}

pub fn password_reset_email(to: &str, reset_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        html: format!(
            "<h2>Password Reset</h2>\
             <p>Click below to reset your password:</p>\
             <a href=\"{reset_url}\" target=\"_blank\">{reset_url}</a>\
             <p>This link is valid for 15 minutes only.</p>"
        ),
    }
}

pub fn otp_sms(to: &str, code: &str) -> SmsMessage {
    SmsMessage {
        to: to.to_string(),
        body: format!("Your OTP is: {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_email_sender_posts_json_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_json(serde_json::json!({
                "from": "shop@example.com",
                "to": "buyer@example.com",
                "subject": "Password Reset Request",
                "html": "<p>hi</p>"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sender = HttpEmailSender::new(
            format!("{}/send", server.uri()),
            Some("mail-key".into()),
            "shop@example.com",
        );
        sender
            .send_email(EmailMessage {
                to: "buyer@example.com".into(),
                subject: "Password Reset Request".into(),
                html: "<p>hi</p>".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let sender = HttpSmsSender::new(server.uri(), None);
        let err = sender
            .send_sms(otp_sms("+919876543210", "123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn memory_outbox_records_messages() {
        let outbox = MemoryOutbox::default();
        let notifier = Notifier::memory(outbox.clone());

        notifier
            .email
            .send_email(verification_email("a@example.com", "Asha", "http://x/verify-email/t"))
            .await
            .unwrap();
        notifier.sms.send_sms(otp_sms("+911234567890", "654321")).await.unwrap();

        assert_eq!(outbox.emails().len(), 1);
        assert!(outbox.emails()[0].html.contains("http://x/verify-email/t"));
        assert_eq!(outbox.sms()[0].body, "Your OTP is: 654321");
    }
}
