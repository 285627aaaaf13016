/*!
 * # Rate Limiting Module
 *
 * Fixed-window request limiting for the HTTP API:
 *
 * - Global limit per client (signed-in user, otherwise IP address)
 * - Path-prefix policies parsed from configuration
 * - Per-route limiters for sensitive endpoints (login, OTP, password reset)
 *
 * Counters live in process memory (DashMap) or in Redis (`INCR` + `EXPIRE`)
 * so several API instances can share a window. Redis failures fall back to
 * the in-memory store.
 *
 * Every limited response carries `RateLimit-Limit`, `RateLimit-Remaining`
 * and `RateLimit-Reset`; rejections add `Retry-After`.
 *
 * ## Usage
 *
 * ```ignore
 * let global = RateLimitLayer::new(RateLimitConfig::default(), RateLimitBackend::InMemory);
 * let app = Router::new()
 *     .route("/login/email", post(login).layer(global.route("login", 10, Duration::from_secs(900))))
 *     .layer(global);
 * ```
 */
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Response},
    response::IntoResponse,
};
use dashmap::DashMap;
use metrics::counter;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AuthService, AuthUser};
use crate::errors::ServiceError;

fn num_to_header_value<T: ToString>(n: T) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        RateLimitError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    /// Window of the limiter that last counted this key
    window: Duration,
}

impl RateLimitEntry {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
        }
    }

    /// Counts one request; `false` when the window is already full.
    fn try_acquire(&mut self, limit: u32, window: Duration, now: Instant) -> bool {
        self.window = window;
        if now.duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }

        if self.count >= limit {
            return false;
        }

        self.count += 1;
        true
    }

    fn time_until_reset(&self, window: Duration, now: Instant) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        }
    }
}

impl From<&crate::config::AppConfig> for RateLimitConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            requests_per_window: cfg.rate_limit_requests_per_window,
            window_duration: Duration::from_secs(cfg.rate_limit_window_seconds),
            enable_headers: cfg.rate_limit_enable_headers,
        }
    }
}

#[derive(Clone, Default)]
pub enum RateLimitBackend {
    #[default]
    InMemory,
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
    },
}

#[derive(Clone)]
enum RateLimitStore {
    InMemory {
        entries: Arc<DashMap<String, RateLimitEntry>>,
    },
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
        fallback: Arc<DashMap<String, RateLimitEntry>>,
    },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: RateLimitStore,
    config: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        let store = match backend {
            RateLimitBackend::InMemory => RateLimitStore::InMemory {
                entries: Arc::new(DashMap::new()),
            },
            RateLimitBackend::Redis { client, namespace } => RateLimitStore::Redis {
                client,
                namespace,
                fallback: Arc::new(DashMap::new()),
            },
        };

        Self { store, config }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, RateLimitBackend::InMemory)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Same counters, different window settings.
    pub fn with_config(&self, config: RateLimitConfig) -> Self {
        Self {
            store: self.store.clone(),
            config,
        }
    }

    pub async fn check_rate_limit(&self, key: &str) -> RateLimitResult {
        match &self.store {
            RateLimitStore::InMemory { entries } => {
                Self::check_in_memory(entries, key, &self.config)
            }
            RateLimitStore::Redis {
                client,
                namespace,
                fallback,
            } => match Self::check_with_redis(client, namespace, key, &self.config).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "redis rate limit check failed, using in-memory fallback");
                    Self::check_in_memory(fallback, key, &self.config)
                }
            },
        }
    }

    fn check_in_memory(
        entries: &DashMap<String, RateLimitEntry>,
        key: &str,
        config: &RateLimitConfig,
    ) -> RateLimitResult {
        let now = Instant::now();
        let mut entry = entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::new(now, config.window_duration));

        let allowed =
            entry.try_acquire(config.requests_per_window, config.window_duration, now);

        RateLimitResult {
            allowed,
            limit: config.requests_per_window,
            remaining: config.requests_per_window.saturating_sub(entry.count),
            reset_time: entry.time_until_reset(config.window_duration, now),
        }
    }

    async fn check_with_redis(
        client: &redis::Client,
        namespace: &str,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut conn = client.get_async_connection().await?;
        let redis_key = format!("{}:{}", namespace, key);
        let window_secs = config.window_duration.as_secs().max(1);

        let count: i64 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
        }

        let ttl_secs = match conn.ttl::<_, i64>(&redis_key).await {
            Ok(ttl) if ttl > 0 => ttl as u64,
            _ => {
                let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
                window_secs
            }
        };

        let allowed = count <= i64::from(config.requests_per_window);
        Ok(RateLimitResult {
            allowed,
            limit: config.requests_per_window,
            remaining: config
                .requests_per_window
                .saturating_sub(count.clamp(0, i64::from(u32::MAX)) as u32),
            reset_time: Duration::from_secs(ttl_secs),
        })
    }

    /// Drops in-memory windows that have already ended, each by its own length.
    pub fn cleanup_expired(&self) {
        let entries = match &self.store {
            RateLimitStore::InMemory { entries } => entries,
            RateLimitStore::Redis { fallback, .. } => fallback,
        };
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < entry.window);
    }
}

/// Periodically evicts finished windows from the in-memory store.
pub async fn start_cleanup_task(rate_limiter: RateLimiter, interval: Duration) {
    let mut interval_timer = tokio::time::interval(interval);

    loop {
        interval_timer.tick().await;
        rate_limiter.cleanup_expired();
        debug!("rate limiter cleanup completed");
    }
}

#[derive(Clone, Debug)]
pub struct PathPolicy {
    pub prefix: String,
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

/// Client IP key: first `x-forwarded-for` hop, then `x-real-ip`.
pub fn extract_ip_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}

/// Authenticated user key from an attached [`AuthUser`] or a valid session token.
///
/// Takes owned request data so the returned future stays `Send`.
pub async fn extract_user_key(
    auth_user: Option<Uuid>,
    token: Option<String>,
    auth_service: Option<&Arc<AuthService>>,
) -> Option<String> {
    if let Some(user_id) = auth_user {
        return Some(format!("user:{}", user_id));
    }

    let service = auth_service?;
    let token = token?;
    service
        .validate_token(&token)
        .await
        .ok()
        .map(|claims| format!("user:{}", claims.sub))
}

fn key_type(key: &str) -> &'static str {
    if key.starts_with("user:") {
        "user"
    } else {
        "ip"
    }
}

fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert("RateLimit-Limit", num_to_header_value(result.limit));
    headers.insert("RateLimit-Remaining", num_to_header_value(result.remaining));
    headers.insert(
        "RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
}

/// The 429 body shared by the global and per-route limiters.
pub fn too_many_requests(result: &RateLimitResult, with_headers: bool) -> Response<axum::body::Body> {
    let mut response = ServiceError::RateLimitExceeded.into_response();
    if with_headers {
        apply_headers(response.headers_mut(), result);
    }
    response.headers_mut().insert(
        header::RETRY_AFTER,
        num_to_header_value(result.reset_time.as_secs().max(1)),
    );
    response
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyStrategy {
    /// Signed-in user, then IP
    Client,
    /// Always the client IP
    IpOnly,
}

#[derive(Clone)]
pub struct RateLimitLayer {
    rate_limiter: RateLimiter,
    path_policies: Arc<Vec<PathPolicy>>,
    auth_service: Option<Arc<AuthService>>,
    strategy: KeyStrategy,
    scope: Arc<str>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config, backend),
            path_policies: Arc::new(Vec::new()),
            auth_service: None,
            strategy: KeyStrategy::Client,
            scope: Arc::from("global"),
        }
    }

    /// IP-keyed limiter for a single route, counted in this layer's store.
    ///
    /// Counters are namespaced by `name`, so they are swept by the same
    /// cleanup task and live in Redis when the global limiter does.
    pub fn route(&self, name: &str, limit: u32, window: Duration) -> Self {
        let config = RateLimitConfig {
            requests_per_window: limit,
            window_duration: window,
            enable_headers: self.rate_limiter.config().enable_headers,
        };
        Self {
            rate_limiter: self.rate_limiter.with_config(config),
            path_policies: Arc::new(Vec::new()),
            auth_service: None,
            strategy: KeyStrategy::IpOnly,
            scope: Arc::from(format!("route:{}", name)),
        }
    }

    pub fn with_policies(mut self, policies: Vec<PathPolicy>) -> Self {
        self.path_policies = Arc::new(policies);
        self
    }

    pub fn with_auth_service(mut self, auth_service: Arc<AuthService>) -> Self {
        self.auth_service = Some(auth_service);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

impl<S> tower::Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    layer: RateLimitLayer,
}

fn is_exempt(path: &str) -> bool {
    path.starts_with("/health") || path.starts_with("/docs") || path.starts_with("/api-docs")
}

impl<S> tower::Service<Request> for RateLimitService<S>
where
    S: tower::Service<Request, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<axum::body::Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let layer = self.layer.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let path = request.uri().path().to_string();
            if layer.strategy == KeyStrategy::Client && is_exempt(&path) {
                return inner.call(request).await;
            }

            let key = match layer.strategy {
                KeyStrategy::IpOnly => extract_ip_key(request.headers()),
                KeyStrategy::Client => {
                    let user_id = request.extensions().get::<AuthUser>().map(|u| u.user_id);
                    let token = crate::auth::token_from_headers(request.headers());
                    let ip_key = extract_ip_key(request.headers());
                    extract_user_key(user_id, token, layer.auth_service.as_ref())
                        .await
                        .unwrap_or(ip_key)
                }
            };

            let base = layer.rate_limiter.config();
            let policy = layer.path_policies.iter().find(|p| path.starts_with(&p.prefix));
            let limiter = match policy {
                Some(policy) => layer.rate_limiter.with_config(RateLimitConfig {
                    requests_per_window: policy.requests_per_window,
                    window_duration: policy.window_duration,
                    enable_headers: base.enable_headers,
                }),
                None => layer.rate_limiter.clone(),
            };
            let enable_headers = base.enable_headers;

            // Policy counters are per prefix; route counters are per route name.
            let counter_key = match (layer.strategy, policy) {
                (KeyStrategy::IpOnly, _) => format!("{}:{}", layer.scope, key),
                (KeyStrategy::Client, Some(policy)) => format!("{}:{}", policy.prefix, key),
                (KeyStrategy::Client, None) => key.clone(),
            };

            let result = limiter.check_rate_limit(&counter_key).await;

            if !result.allowed {
                warn!(key = %key, path = %path, "rate limit exceeded");
                counter!(
                    "rate_limit_denied_total",
                    1,
                    "key_type" => key_type(&key),
                    "scope" => layer.scope.to_string(),
                );
                return Ok(too_many_requests(&result, enable_headers));
            }

            counter!(
                "rate_limit_allowed_total",
                1,
                "key_type" => key_type(&key),
                "scope" => layer.scope.to_string(),
            );

            let mut response = inner.call(request).await?;
            if enable_headers {
                apply_headers(response.headers_mut(), &result);
            }
            Ok(response)
        })
    }
}

/// Errors that can occur when parsing rate limit policy strings
#[derive(Debug, Error)]
pub enum PolicyParseError {
    #[error("Invalid policy format for '{spec}': expected 'path:limit:window_secs', got {parts} parts")]
    InvalidFormat { spec: String, parts: usize },

    #[error("Invalid limit value '{value}' in policy '{spec}': {reason}")]
    InvalidLimit {
        spec: String,
        value: String,
        reason: String,
    },

    #[error("Invalid window duration '{value}' in policy '{spec}': {reason}")]
    InvalidWindow {
        spec: String,
        value: String,
        reason: String,
    },

    #[error("Empty policy specification")]
    EmptySpec,

    #[error("Path policy must start with '/': got '{path}'")]
    InvalidPathFormat { path: String },

    #[error("Window duration must be at least 1 second, got {window_secs}")]
    WindowTooSmall { window_secs: u64 },

    #[error("Limit must be at least 1, got {limit}")]
    LimitTooSmall { limit: u32 },
}

/// Parse a path policy specification string.
///
/// Format: `path:limit:window_secs`, e.g. `/api/v1/orders:100:60`.
pub fn parse_path_policy(spec: &str) -> Result<PathPolicy, PolicyParseError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(PolicyParseError::EmptySpec);
    }

    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 3 {
        return Err(PolicyParseError::InvalidFormat {
            spec: spec.to_string(),
            parts: parts.len(),
        });
    }

    let path = parts[0].trim();
    if !path.starts_with('/') {
        return Err(PolicyParseError::InvalidPathFormat {
            path: path.to_string(),
        });
    }

    let limit: u32 = parts[1]
        .trim()
        .parse()
        .map_err(|e| PolicyParseError::InvalidLimit {
            spec: spec.to_string(),
            value: parts[1].to_string(),
            reason: format!("{}", e),
        })?;

    if limit < 1 {
        return Err(PolicyParseError::LimitTooSmall { limit });
    }

    let window_secs: u64 =
        parts[2]
            .trim()
            .parse()
            .map_err(|e| PolicyParseError::InvalidWindow {
                spec: spec.to_string(),
                value: parts[2].to_string(),
                reason: format!("{}", e),
            })?;

    if window_secs < 1 {
        return Err(PolicyParseError::WindowTooSmall { window_secs });
    }

    Ok(PathPolicy {
        prefix: path.to_string(),
        requests_per_window: limit,
        window_duration: Duration::from_secs(window_secs),
    })
}

/// Parse comma-separated path policies; invalid entries become warnings.
pub fn parse_path_policies(policies_str: &str) -> (Vec<PathPolicy>, Vec<String>) {
    let mut policies = Vec::new();
    let mut warnings = Vec::new();

    for spec in policies_str
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        match parse_path_policy(spec) {
            Ok(policy) => policies.push(policy),
            Err(e) => warnings.push(format!("Skipping invalid path policy '{}': {}", spec, e)),
        }
    }

    (policies, warnings)
}

#[cfg(test)]
mod policy_parsing_tests {
    use super::*;

    #[test]
    fn test_parse_valid_path_policy() {
        let policy = parse_path_policy("/api/v1/orders:100:60").unwrap();
        assert_eq!(policy.prefix, "/api/v1/orders");
        assert_eq!(policy.requests_per_window, 100);
        assert_eq!(policy.window_duration, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_path_policy_with_spaces() {
        let policy = parse_path_policy("  /api/v1/orders : 100 : 60  ").unwrap();
        assert_eq!(policy.prefix, "/api/v1/orders");
        assert_eq!(policy.requests_per_window, 100);
    }

    #[test]
    fn test_parse_path_policy_invalid_format() {
        let result = parse_path_policy("/api/v1/orders:100");
        assert!(matches!(
            result,
            Err(PolicyParseError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_parse_path_policy_no_leading_slash() {
        let result = parse_path_policy("api/v1/orders:100:60");
        assert!(matches!(
            result,
            Err(PolicyParseError::InvalidPathFormat { .. })
        ));
    }

    #[test]
    fn test_parse_path_policy_invalid_limit() {
        let result = parse_path_policy("/api:abc:60");
        assert!(matches!(result, Err(PolicyParseError::InvalidLimit { .. })));
    }

    #[test]
    fn test_parse_path_policy_zero_limit_and_window() {
        assert!(matches!(
            parse_path_policy("/api:0:60"),
            Err(PolicyParseError::LimitTooSmall { .. })
        ));
        assert!(matches!(
            parse_path_policy("/api:100:0"),
            Err(PolicyParseError::WindowTooSmall { .. })
        ));
    }

    #[test]
    fn test_parse_multiple_path_policies() {
        let (policies, warnings) = parse_path_policies(
            "/api/v1/orders:100:60,/api/v1/products:200:60,invalid,/api/v1/cart:50:30",
        );
        assert_eq!(policies.len(), 3);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn config(limit: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_window: limit,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        }
    }

    #[tokio::test]
    async fn allows_exactly_the_limit_per_window() {
        let limiter = RateLimiter::in_memory(config(2));

        let first = limiter.check_rate_limit("ip:1.2.3.4").await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check_rate_limit("ip:1.2.3.4").await;
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        assert!(!limiter.check_rate_limit("ip:1.2.3.4").await.allowed);
    }

    #[tokio::test]
    async fn keys_are_counted_separately() {
        let limiter = RateLimiter::in_memory(config(1));
        assert!(limiter.check_rate_limit("key1").await.allowed);
        assert!(limiter.check_rate_limit("key2").await.allowed);
        assert!(!limiter.check_rate_limit("key1").await.allowed);
        assert!(!limiter.check_rate_limit("key2").await.allowed);
    }

    #[test]
    fn window_rollover_resets_the_count() {
        let start = Instant::now();
        let window = Duration::from_secs(10);
        let mut entry = RateLimitEntry::new(start, window);

        assert!(entry.try_acquire(1, window, start));
        assert!(!entry.try_acquire(1, window, start + Duration::from_secs(5)));
        assert!(entry.try_acquire(1, window, start + Duration::from_secs(10)));
        assert_eq!(
            entry.time_until_reset(window, start + Duration::from_secs(12)),
            Duration::from_secs(8)
        );
    }

    #[tokio::test]
    async fn overrides_share_underlying_store() {
        let base = RateLimiter::in_memory(config(2));
        let strict = base.with_config(config(1));

        assert!(base.check_rate_limit("user:shared").await.allowed);
        assert!(!strict.check_rate_limit("user:shared").await.allowed);
        assert!(strict.check_rate_limit("user:other").await.allowed);
    }

    #[test]
    fn ip_key_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_ip_key(&headers), "ip:unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_ip_key(&headers), "ip:10.0.0.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_ip_key(&headers), "ip:203.0.113.7");
    }

    #[tokio::test]
    async fn cleanup_keeps_windows_longer_than_the_base() {
        let base = RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: 100,
            window_duration: Duration::from_millis(50),
            enable_headers: true,
        });
        let hourly = base.with_config(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(3600),
            enable_headers: true,
        });

        assert!(hourly.check_rate_limit("/api/v1/search:ip:1").await.allowed);
        assert!(hourly.check_rate_limit("/api/v1/search:ip:1").await.allowed);
        assert!(!hourly.check_rate_limit("/api/v1/search:ip:1").await.allowed);

        tokio::time::sleep(Duration::from_millis(100)).await;
        base.cleanup_expired();

        assert!(!hourly.check_rate_limit("/api/v1/search:ip:1").await.allowed);
    }

    #[tokio::test]
    async fn user_key_comes_from_the_attached_session() {
        let user_id = Uuid::new_v4();
        assert_eq!(
            extract_user_key(Some(user_id), Some("ignored".into()), None).await,
            Some(format!("user:{}", user_id))
        );
        assert_eq!(extract_user_key(None, Some("token".into()), None).await, None);
        assert_eq!(extract_user_key(None, None, None).await, None);
    }

    #[tokio::test]
    async fn route_limiters_count_in_the_shared_store() {
        let global = RateLimitLayer::new(config(100), RateLimitBackend::InMemory);
        let app = Router::new().route(
            "/limited",
            get(|| async { "ok" }).layer(global.route("limited", 1, Duration::from_secs(60))),
        );

        let request = Request::builder()
            .uri("/limited")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::OK);

        let limiter = global.limiter();
        let route_window = limiter.with_config(config(1));
        assert!(!route_window
            .check_rate_limit("route:limited:ip:198.51.100.4")
            .await
            .allowed);
        // the global counter for the same client is untouched
        assert_eq!(limiter.check_rate_limit("ip:198.51.100.4").await.remaining, 99);
    }

    #[tokio::test]
    async fn route_layer_rejects_with_json_and_headers() {
        let global = RateLimitLayer::new(config(100), RateLimitBackend::InMemory);
        let app = Router::new().route(
            "/limited",
            get(|| async { "ok" }).layer(global.route("limited", 1, Duration::from_secs(60))),
        );

        let request = || {
            Request::builder()
                .uri("/limited")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let ok = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["RateLimit-Limit"], "1");
        assert_eq!(ok.headers()["RateLimit-Remaining"], "0");

        let limited = app.oneshot(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));

        let body = axum::body::to_bytes(limited.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Too many requests, please try again later.");
    }

    #[tokio::test]
    async fn global_layer_skips_health_and_applies_path_policies() {
        let layer = RateLimitLayer::new(config(100), RateLimitBackend::InMemory)
            .with_policies(vec![parse_path_policy("/api/v1/search:1:60").unwrap()]);
        let app = Router::new()
            .route("/health", get(|| async { "up" }))
            .route("/api/v1/search", get(|| async { "results" }))
            .layer(layer);

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key("RateLimit-Limit"));
        }

        let search = || Request::builder().uri("/api/v1/search").body(Body::empty()).unwrap();
        assert_eq!(
            app.clone().oneshot(search()).await.unwrap().status(),
            StatusCode::OK
        );
        assert_eq!(
            app.oneshot(search()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
