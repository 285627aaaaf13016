//! Shopfront API Library
//!
//! Storefront backend: catalog, carts, orders, payments, shipping zones and
//! admin reporting over a relational store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod payments;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    handlers::AppServices,
    rate_limiter::{parse_path_policies, RateLimitBackend, RateLimitConfig, RateLimitLayer},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
    /// Present only when the rate limiter is backed by Redis
    pub redis: Option<Arc<redis::Client>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        services: AppServices,
        redis: Option<Arc<redis::Client>>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
            services,
            redis,
            started_at: Instant::now(),
        }
    }
}

/// Everything mounted under `/api/v1`; route limits count in `limits`' store.
pub fn api_v1_routes(limits: &RateLimitLayer) -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::health::api_status))
        .nest("/auth", handlers::auth::auth_routes(limits))
        .nest("/users", handlers::users::users_routes())
        .nest("/products", handlers::products::products_routes())
        .nest("/search", handlers::search::search_routes())
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/addresses", handlers::addresses::addresses_routes())
        .nest("/reviews", handlers::reviews::reviews_routes())
        .nest("/wishlist", handlers::wishlist::wishlist_routes())
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/admin", handlers::admin::admin_routes())
        .nest("/shipping", handlers::shipping::shipping_routes())
        .nest("/currencies", handlers::currencies::currencies_routes())
}

/// Builds the CORS policy from configuration.
///
/// Credentials cannot be combined with wildcard headers, so explicit origins
/// get an explicit method list and mirrored request headers.
pub fn cors_layer(cfg: &AppConfig) -> Result<CorsLayer, ServiceError> {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(AllowHeaders::mirror_request())
            .expose_headers([header::CONTENT_DISPOSITION])
            .allow_credentials(cfg.cors_allow_credentials));
    }

    if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            environment = %cfg.environment,
            "Using permissive CORS because explicit origins were not configured"
        );
        return Ok(CorsLayer::permissive());
    }

    Err(ServiceError::InternalError(
        "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
            .to_string(),
    ))
}

/// The global limiter; per-route limits are attached inside the routers.
pub fn rate_limit_layer(
    cfg: &AppConfig,
    redis: Option<Arc<redis::Client>>,
    auth_service: Arc<AuthService>,
) -> RateLimitLayer {
    let backend = match redis {
        Some(client) if cfg.rate_limit_use_redis => RateLimitBackend::Redis {
            client,
            namespace: cfg.rate_limit_namespace.clone(),
        },
        _ => RateLimitBackend::InMemory,
    };

    let mut layer = RateLimitLayer::new(RateLimitConfig::from(cfg), backend)
        .with_auth_service(auth_service);

    if let Some(raw) = cfg.rate_limit_path_policies.as_deref() {
        let (policies, warnings) = parse_path_policies(raw);
        for warning in &warnings {
            ::tracing::warn!("Rate limit policy configuration: {}", warning);
        }
        if !policies.is_empty() {
            ::tracing::info!("Configured {} path-based rate limit policies", policies.len());
            layer = layer.with_policies(policies);
        }
    }

    layer
}

async fn inject_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

async fn security_headers(State(hsts): State<bool>, request: Request<Body>, next: Next) -> Response {
    if hsts {
        middleware_helpers::security_headers_with_hsts_middleware(request, next).await
    } else {
        middleware_helpers::security_headers_middleware(request, next).await
    }
}

/// Assembles the full HTTP application around `state`.
pub fn build_router(state: AppState, rate_limit: RateLimitLayer) -> Result<Router, ServiceError> {
    let cors = cors_layer(&state.config)?;
    let auth_service = state.services.auth.clone();

    let hsts = state.config.is_production();
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes(&rate_limit))
        .merge(openapi::swagger_ui())
        .layer(TimeoutLayer::new(timeout))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(hsts, security_headers))
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            inject_auth_service,
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
        .layer(rate_limit);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str) -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "redis://127.0.0.1:6379".into(),
            "a_test_secret_that_is_at_least_thirty_two_chars".into(),
            3600,
            86400,
            "127.0.0.1".into(),
            8080,
            environment.into(),
        )
    }

    #[test]
    fn development_falls_back_to_permissive_cors() {
        assert!(cors_layer(&config("development")).is_ok());
    }

    #[test]
    fn production_requires_origins() {
        assert!(cors_layer(&config("production")).is_err());

        let mut cfg = config("production");
        cfg.cors_allowed_origins = Some("https://shop.example.com, https://admin.example.com".into());
        assert!(cors_layer(&cfg).is_ok());
    }
}
