/*!
 * # Authentication and Authorization Module
 *
 * JWT sessions for storefront customers and administrators:
 *
 * - Access and refresh tokens (HS256) with issuer/audience checks
 * - Session transport via `Authorization: Bearer` or the HttpOnly `token` cookie
 * - Logout revocation through an in-memory jti blacklist and the
 *   `refresh_tokens` table
 * - Required / optional authentication and role gating middleware
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

// Entity modules
pub mod otp;
pub mod refresh_token;
pub mod user;

// Feature modules
pub mod cookies;
pub mod one_time;
pub mod password;
pub mod password_policy;

pub use cookies::{CookieBuilder, GUEST_CART_COOKIE, SESSION_COOKIE};
pub use user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // `user` or `admin`
    pub jti: String,  // JWT ID (unique identifier for this token)
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub kind: TokenKind,
}

/// Authenticated user attached to request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub token_id: String,
    pub token_expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
    pub cookie_max_age: Duration,
    pub secure_cookies: bool,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
            cookie_max_age: access_token_expiration,
            secure_cookies: false,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
            refresh_token_expiration: Duration::from_secs(cfg.refresh_token_expiration as u64),
            cookie_max_age: cfg.cookie_max_age(),
            secure_cookies: cfg.is_production(),
        }
    }
}

/// Token pair response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    blacklisted_tokens: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    fn claims_for(&self, user: &user::Model, kind: TokenKind, lifetime: Duration) -> Result<Claims, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(lifetime)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        Ok(Claims {
            sub: user.id.to_string(),
            role: user.role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            kind,
        })
    }

    /// Issues an access/refresh pair and persists the refresh token id.
    pub async fn generate_token(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let access_claims =
            self.claims_for(user, TokenKind::Access, self.config.access_token_expiration)?;
        let refresh_claims =
            self.claims_for(user, TokenKind::Refresh, self.config.refresh_token_expiration)?;

        let access_token = self.sign(&access_claims)?;
        let refresh_token = self.sign(&refresh_claims)?;

        self.store_refresh_token(user.id, &refresh_claims.jti, timestamp(refresh_claims.exp))
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Decodes a token, checking signature, expiry, issuer, audience and the blacklist.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Resolves an access token to the current user record.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token).await?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthUser {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            token_id: claims.jti,
            token_expires_at: timestamp(claims.exp),
        })
    }

    /// Exchanges a refresh token for a new pair; the old refresh token is revoked.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<(TokenPair, user::Model), AuthError> {
        let claims = self.validate_token(refresh_token).await?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let stored = refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenId.eq(claims.jti.clone()))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;
        match stored {
            Some(row) if row.is_usable(Utc::now()) => {}
            _ => return Err(AuthError::RevokedToken),
        }

        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let pair = self.generate_token(&user).await?;
        self.revoke_refresh_token(&claims.jti).await?;

        Ok((pair, user))
    }

    /// Blacklists the access token behind `auth_user` until it expires.
    pub async fn revoke_session(&self, auth_user: &AuthUser) {
        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.insert(auth_user.token_id.clone(), auth_user.token_expires_at);

        let now = Utc::now();
        blacklist.retain(|_, expiry| *expiry > now);
    }

    /// Marks every outstanding refresh token of the user as revoked.
    pub async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = refresh_token::Entity::update_many()
            .col_expr(
                refresh_token::Column::RevokedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        debug!(user_id = %user_id, count = result.rows_affected, "revoked refresh tokens");
        Ok(())
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist
            .get(token_id)
            .map_or(false, |expiry| *expiry > Utc::now())
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_id: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        refresh_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_id: Set(token_id.to_string()),
            created_at: Set(Utc::now()),
            expires_at: Set(expiry),
            revoked_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, token_id: &str) -> Result<(), AuthError> {
        refresh_token::Entity::update_many()
            .col_expr(
                refresh_token::Column::RevokedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(refresh_token::Column::TokenId.eq(token_id))
            .filter(refresh_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// `Set-Cookie` value carrying a freshly issued access token.
    pub fn session_cookie(&self, access_token: &str) -> CookieBuilder {
        CookieBuilder::new(SESSION_COOKIE, access_token)
            .max_age(self.config.cookie_max_age)
            .secure(self.config.secure_cookies)
    }

    /// `Set-Cookie` value clearing the session cookie.
    pub fn clear_session_cookie(&self) -> CookieBuilder {
        CookieBuilder::removal(SESSION_COOKIE, self.config.secure_cookies)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authorized, no token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired, please login again")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("User not found")]
    UserNotFound,

    #[error("User role {0} is not authorized to access this route")]
    InsufficientRole(String),

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientRole(_) => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            AuthError::DatabaseError(db) => ServiceError::DatabaseError(db),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Bearer token first, then the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| cookies::read_cookie(headers, SESSION_COOKIE))
}

fn auth_service_from(request: &Request) -> Option<Arc<AuthService>> {
    request.extensions().get::<Arc<AuthService>>().cloned()
}

/// Authentication middleware; rejects the request without a valid session.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(auth_service) = auth_service_from(&request) else {
        return AuthError::InternalError("Authentication service not available".to_string())
            .into_response();
    };

    let Some(token) = token_from_headers(request.headers()) else {
        return AuthError::MissingToken.into_response();
    };

    match auth_service.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "rejected session");
            e.into_response()
        }
    }
}

/// Attaches the user when a valid session exists; never rejects.
pub async fn optional_auth_middleware(mut request: Request, next: Next) -> Response {
    if let (Some(auth_service), Some(token)) =
        (auth_service_from(&request), token_from_headers(request.headers()))
    {
        match auth_service.authenticate(&token).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(e) => debug!(error = %e, "ignoring invalid optional session"),
        }
    }
    next.run(request).await
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<UserRole>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_role(required_role) {
        warn!(user_id = %user.user_id, role = user.role.as_str(), "role check failed");
        return Err(AuthError::InsufficientRole(user.role.as_str().to_string()));
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Extractor for routes behind [`optional_auth_middleware`].
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_optional_auth(self) -> Self;
    fn with_role(self, role: UserRole) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_optional_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(optional_auth_middleware))
    }

    fn with_role(self, role: UserRole) -> Self {
        self.layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let config = AuthConfig::new(
            "k3y-for-unit-tests-0123456789-abcdefghijkl".to_string(),
            "shopfront-clients".to_string(),
            "shopfront-api".to_string(),
            Duration::from_secs(900),
            Duration::from_secs(3600),
        );
        AuthService::new(config, Arc::new(DatabaseConnection::Disconnected))
    }

    fn claims(service: &AuthService, exp_offset: i64, kind: TokenKind) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4().to_string(),
            role: "user".into(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + exp_offset,
            iss: service.config.jwt_issuer.clone(),
            aud: service.config.jwt_audience.clone(),
            kind,
        }
    }

    #[tokio::test]
    async fn valid_tokens_round_trip_their_claims() {
        let service = service();
        let original = claims(&service, 600, TokenKind::Access);
        let token = service.sign(&original).unwrap();

        let decoded = service.validate_token(&token).await.unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn expired_tokens_are_reported_as_expired() {
        let service = service();
        let token = service
            .sign(&claims(&service, -3600, TokenKind::Access))
            .unwrap();
        assert!(matches!(
            service.validate_token(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let service = service();
        let mut foreign = claims(&service, 600, TokenKind::Access);
        foreign.aud = "someone-else".into();
        let token = service.sign(&foreign).unwrap();
        assert!(matches!(
            service.validate_token(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn revoked_sessions_fail_validation() {
        let service = service();
        let original = claims(&service, 600, TokenKind::Access);
        let token = service.sign(&original).unwrap();

        service
            .revoke_session(&AuthUser {
                user_id: Uuid::new_v4(),
                name: "n".into(),
                email: "e@example.com".into(),
                role: UserRole::User,
                token_id: original.jti.clone(),
                token_expires_at: timestamp(original.exp),
            })
            .await;

        assert!(matches!(
            service.validate_token(&token).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_cannot_authenticate_requests() {
        let service = service();
        let token = service
            .sign(&claims(&service, 600, TokenKind::Refresh))
            .unwrap();
        assert!(matches!(
            service.authenticate(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(header::COOKIE, "token=from-cookie".parse().unwrap());
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn auth_errors_map_to_expected_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientRole("user".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::from(AuthError::MissingToken).response_message(),
            "Not authorized, no token"
        );
    }
}
