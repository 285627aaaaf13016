#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use shopfront_api::{
    auth::{password::hash_password, user, AuthConfig, AuthService, UserRole},
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    notifications::{MemoryOutbox, Notifier},
    payments::PaymentGateway,
    services::products::{CreateProductRequest, ProductWithVariants, VariantInput},
    entities::product::ProductCategory,
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "Secur3P@ss";

/// A signed-in account created directly in the database.
pub struct TestUser {
    pub user: user::Model,
    pub token: String,
}

/// Application harness backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub outbox: MemoryOutbox,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn test_config(database_url: String) -> AppConfig {
    let mut cfg = AppConfig::new(
        database_url,
        "redis://127.0.0.1:6379".to_string(),
        "test_secret_key_for_testing_purposes_only_32chars".to_string(),
        3600,
        86_400,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.cors_allow_any_origin = true;
    cfg.db_max_connections = 4;
    cfg.db_min_connections = 1;
    cfg.rate_limit_requests_per_window = 10_000;
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(|_| {}, None).await
    }

    /// Builds the app with a tweaked config and an optional payment gateway.
    pub async fn build(
        configure: impl FnOnce(&mut AppConfig),
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("shopfront_test.db");
        let mut cfg = test_config(format!("sqlite://{}?mode=rwc", path.display()));
        configure(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_sender, event_rx) = EventSender::channel(256);
        let event_sender = Arc::new(event_sender);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg), db_arc.clone()));
        let outbox = MemoryOutbox::default();
        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            event_sender.clone(),
            auth_service.clone(),
            Notifier::memory(outbox.clone()),
            gateway,
        );

        let rate_limit = shopfront_api::rate_limit_layer(&cfg, None, auth_service);
        let state = AppState::new(db_arc, Arc::new(cfg), event_sender, services, None);
        let router =
            shopfront_api::build_router(state.clone(), rate_limit).expect("router builds");

        Self {
            router,
            state,
            outbox,
            _dir: dir,
            _event_task: event_task,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// JSON request with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    /// Inserts a verified account and signs it in.
    pub async fn create_user(&self, email: &str, role: UserRole) -> TestUser {
        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Shopper".to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            password_hash: Set(hash_password(TEST_PASSWORD).expect("hash password")),
            role: Set(role),
            is_verified: Set(true),
            verification_token_hash: Set(None),
            verification_expires_at: Set(None),
            reset_token_hash: Set(None),
            reset_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let tokens = self
            .state
            .services
            .auth
            .generate_token(&created)
            .await
            .expect("issue token");

        TestUser {
            user: created,
            token: tokens.access_token,
        }
    }

    pub async fn customer(&self) -> TestUser {
        self.create_user(&format!("shopper-{}@example.com", Uuid::new_v4().simple()), UserRole::User)
            .await
    }

    pub async fn admin(&self) -> TestUser {
        self.create_user(&format!("admin-{}@example.com", Uuid::new_v4().simple()), UserRole::Admin)
            .await
    }

    /// One product with a single variant.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductWithVariants {
        self.state
            .services
            .products
            .create(CreateProductRequest {
                name: name.to_string(),
                description: format!("{} description", name),
                details: None,
                category: ProductCategory::Men,
                images: Vec::new(),
                variants: vec![VariantInput {
                    size: "M".to_string(),
                    color: "Black".to_string(),
                    price,
                    quantity: stock,
                }],
            })
            .await
            .expect("seed product")
    }

    /// Creates a delivery address over HTTP and returns its id.
    pub async fn create_address(&self, token: &str) -> Uuid {
        let response = self
            .request(
                Method::POST,
                "/api/v1/addresses",
                Some(address_body()),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201, "address creation should succeed");
        let body = response_json(response).await;
        body["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("address id")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn address_body() -> Value {
    json!({
        "fullName": "Asha Rao",
        "mobileNumber": "9876543210",
        "addressLine1": "12 MG Road",
        "city": "Bengaluru",
        "district": "Bengaluru Urban",
        "state": "Karnataka",
        "pincode": "560001",
        "isDefault": true
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Decimals serialize as strings; accept numbers too.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

/// The `name=value` pair of a `Set-Cookie` header for `name`.
pub fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
