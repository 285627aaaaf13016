//! Account lifecycle: registration, the three login flows, email
//! verification, password reset and profile maintenance.

use crate::{
    auth::{
        one_time::{self, OneTimeToken, RESET_TOKEN_BYTES, VERIFICATION_TOKEN_BYTES},
        otp,
        password::{hash_password, verify_password},
        password_policy::validate_password_strength,
        refresh_token, user, AuthService, AuthUser, TokenPair, UserRole,
    },
    config::AppConfig,
    entities::review,
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{otp_sms, password_reset_email, verification_email, Notifier},
    services::{addresses, cart, wishlist},
};
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    pub static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap();
}

/// Keeps digits and a single leading `+`.
pub fn sanitize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Validates the sanitized form, so spaced or dashed input is accepted.
fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(&sanitize_phone(raw)) {
        return Ok(());
    }
    let mut err = ValidationError::new("phone");
    err.message = Some("Please provide a valid phone number".into());
    Err(err)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhoneRequest {
    #[validate(custom = "validate_phone")]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    pub phone: String,
    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(alias = "current_password")]
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[serde(alias = "new_password")]
    #[validate(custom = "validate_password_strength")]
    pub new_password: String,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserProfile {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            role: u.role,
            is_verified: u.is_verified,
            created_at: u.created_at,
        }
    }
}

/// A freshly issued login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Lifetimes and links used by the account flows.
#[derive(Debug, Clone)]
pub struct AccountPolicy {
    pub client_url: String,
    pub otp_ttl: Duration,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            client_url: "http://localhost:3000".to_string(),
            otp_ttl: Duration::minutes(5),
            verification_ttl: Duration::minutes(10),
            reset_ttl: Duration::minutes(15),
        }
    }
}

impl From<&AppConfig> for AccountPolicy {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            client_url: cfg.client_url.trim_end_matches('/').to_string(),
            otp_ttl: Duration::seconds(cfg.otp_ttl_secs),
            verification_ttl: Duration::seconds(cfg.verification_token_ttl_secs),
            reset_ttl: Duration::seconds(cfg.reset_token_ttl_secs),
        }
    }
}

/// Removes everything a user owns except their orders.
pub async fn delete_user_data<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    cart::delete_user_cart(conn, user_id).await?;
    wishlist::delete_for_user(conn, user_id).await?;
    addresses::delete_for_user(conn, user_id).await?;
    review::Entity::delete_many()
        .filter(review::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    otp::Entity::delete_many()
        .filter(otp::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    notifier: Notifier,
    event_sender: Arc<EventSender>,
    policy: AccountPolicy,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        notifier: Notifier,
        event_sender: Arc<EventSender>,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            db,
            auth,
            notifier,
            event_sender,
            policy,
        }
    }

    async fn find_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Phone.eq(sanitize_phone(phone)))
            .one(&*self.db)
            .await?)
    }

    async fn issue_session(&self, found: user::Model) -> Result<Session, ServiceError> {
        let mut active: user::ActiveModel = found.into();
        active.last_login_at = Set(Some(Utc::now()));
        let found = active.update(&*self.db).await?;

        let tokens = self.auth.generate_token(&found).await?;
        Ok(Session {
            user: found.into(),
            tokens,
        })
    }

    fn verify_url(&self, token: &str) -> String {
        format!("{}/verify-email/{}", self.policy.client_url, token)
    }

    /// Creates an unverified account and emails its verification link.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        let phone = request.phone.as_deref().map(sanitize_phone);

        let mut duplicate = Condition::any().add(user::Column::Email.eq(email.clone()));
        if let Some(phone) = &phone {
            duplicate = duplicate.add(user::Column::Phone.eq(phone.clone()));
        }
        if user::Entity::find()
            .filter(duplicate)
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::BadRequest("User already exists".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let token = OneTimeToken::generate(VERIFICATION_TOKEN_BYTES);
        let now = Utc::now();

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            phone: Set(phone),
            password_hash: Set(password_hash),
            role: Set(UserRole::User),
            is_verified: Set(false),
            verification_token_hash: Set(Some(token.hash)),
            verification_expires_at: Set(Some(now + self.policy.verification_ttl)),
            reset_token_hash: Set(None),
            reset_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        let message = verification_email(&created.email, &created.name, &self.verify_url(&token.plain));
        if let Err(err) = self.notifier.email.send_email(message).await {
            warn!(user_id = %created.id, error = %err, "verification email not delivered");
        }

        info!(user_id = %created.id, "user registered");
        self.event_sender.send_or_log(Event::UserRegistered {
            user_id: created.id,
            email: created.email.clone(),
        });
        Ok(created.into())
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login_with_email(&self, request: LoginRequest) -> Result<Session, ServiceError> {
        request.validate()?;
        let found = self
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        if !verify_password(&request.password, &found.password_hash) {
            warn!(user_id = %found.id, "password mismatch");
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }
        if !found.is_verified {
            return Err(ServiceError::Unauthorized(
                "Please verify your email first".to_string(),
            ));
        }

        self.issue_session(found).await
    }

    /// Rotates a refresh token into a new session.
    #[instrument(skip_all)]
    pub async fn refresh(&self, request: RefreshRequest) -> Result<Session, ServiceError> {
        let (tokens, found) = self.auth.refresh_token(&request.refresh_token).await?;
        Ok(Session {
            user: found.into(),
            tokens,
        })
    }

    /// Stores a fresh login code and texts it to the account's phone.
    #[instrument(skip(self, request))]
    pub async fn request_phone_otp(&self, request: PhoneRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let found = self
            .find_by_phone(&request.phone)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let code = one_time::generate_otp();
        let now = Utc::now();
        otp::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(found.id),
            code: Set(code.clone()),
            expires_at: Set(now + self.policy.otp_ttl),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        let to = found.phone.clone().unwrap_or_default();
        self.notifier
            .sms
            .send_sms(otp_sms(&to, &code))
            .await
            .map_err(|err| {
                warn!(user_id = %found.id, error = %err, "otp sms not delivered");
                ServiceError::ExternalServiceError("Failed to send OTP".to_string())
            })?;

        info!(user_id = %found.id, "otp issued");
        Ok(())
    }

    /// Logs in with a matching unexpired code; every code of the user is consumed.
    #[instrument(skip(self, request))]
    pub async fn verify_phone_otp(&self, request: VerifyOtpRequest) -> Result<Session, ServiceError> {
        request.validate()?;
        let found = self
            .find_by_phone(&request.phone)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let now = Utc::now();
        let matched = otp::Entity::find()
            .filter(otp::Column::UserId.eq(found.id))
            .filter(otp::Column::Code.eq(request.otp.trim()))
            .all(&*self.db)
            .await?
            .into_iter()
            .any(|code| !code.is_expired(now));
        if !matched {
            return Err(ServiceError::BadRequest("Invalid or expired OTP".to_string()));
        }

        otp::Entity::delete_many()
            .filter(otp::Column::UserId.eq(found.id))
            .exec(&*self.db)
            .await?;

        self.issue_session(found).await
    }

    /// Emails a reset link. A delivery failure discards the token and surfaces as 502.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn forgot_password(&self, request: EmailRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let found = self
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let token = OneTimeToken::generate(RESET_TOKEN_BYTES);
        let mut active: user::ActiveModel = found.clone().into();
        active.reset_token_hash = Set(Some(token.hash));
        active.reset_expires_at = Set(Some(Utc::now() + self.policy.reset_ttl));
        let updated = active.update(&*self.db).await?;

        let reset_url = format!("{}/reset-password/{}", self.policy.client_url, token.plain);
        if let Err(err) = self
            .notifier
            .email
            .send_email(password_reset_email(&updated.email, &reset_url))
            .await
        {
            warn!(user_id = %updated.id, error = %err, "reset email not delivered");
            let mut active: user::ActiveModel = updated.into();
            active.reset_token_hash = Set(None);
            active.reset_expires_at = Set(None);
            active.update(&*self.db).await?;
            return Err(ServiceError::ExternalServiceError(
                "Failed to send reset email".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        request: ResetPasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let found = user::Entity::find()
            .filter(user::Column::ResetTokenHash.eq(one_time::hash_token(token)))
            .filter(user::Column::ResetExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid or expired token".to_string()))?;

        let user_id = found.id;
        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(hash_password(&request.password)?);
        active.reset_token_hash = Set(None);
        active.reset_expires_at = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.auth.revoke_user_refresh_tokens(user_id).await?;
        info!(%user_id, "password reset");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> Result<(), ServiceError> {
        let found = user::Entity::find()
            .filter(user::Column::VerificationTokenHash.eq(one_time::hash_token(token)))
            .filter(user::Column::VerificationExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid or expired token".to_string()))?;

        let mut active: user::ActiveModel = found.into();
        active.is_verified = Set(true);
        active.verification_token_hash = Set(None);
        active.verification_expires_at = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn resend_verification(&self, request: EmailRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let found = self
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        if found.is_verified {
            return Err(ServiceError::BadRequest("Email already verified".to_string()));
        }

        let token = OneTimeToken::generate(VERIFICATION_TOKEN_BYTES);
        let mut active: user::ActiveModel = found.into();
        active.verification_token_hash = Set(Some(token.hash));
        active.verification_expires_at = Set(Some(Utc::now() + self.policy.verification_ttl));
        let updated = active.update(&*self.db).await?;

        let message = verification_email(&updated.email, &updated.name, &self.verify_url(&token.plain));
        self.notifier.email.send_email(message).await.map_err(|err| {
            warn!(user_id = %updated.id, error = %err, "verification email not delivered");
            ServiceError::ExternalServiceError("Failed to send verification email".to_string())
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        Ok(self.find_user(user_id).await?.into())
    }

    /// Updates name and phone; the phone is sanitized and must be unused.
    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, ServiceError> {
        request.validate()?;
        let found = self.find_user(user_id).await?;
        let mut active: user::ActiveModel = found.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(raw) = request.phone {
            let phone = sanitize_phone(&raw);
            if !PHONE_RE.is_match(&phone) {
                return Err(ServiceError::BadRequest(
                    "Please provide a valid phone number".to_string(),
                ));
            }
            let taken = user::Entity::find()
                .filter(user::Column::Phone.eq(phone.clone()))
                .filter(user::Column::Id.ne(user_id))
                .one(&*self.db)
                .await?
                .is_some();
            if taken {
                return Err(ServiceError::BadRequest(
                    "Phone number already in use".to_string(),
                ));
            }
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?.into())
    }

    /// Changes the password and revokes every outstanding refresh token.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let found = self.find_user(user_id).await?;
        if !verify_password(&request.current_password, &found.password_hash) {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.auth.revoke_user_refresh_tokens(user_id).await?;
        info!(%user_id, "password changed");
        Ok(())
    }

    /// Deletes the caller's account; their orders are kept.
    #[instrument(skip(self, session))]
    pub async fn delete_account(&self, session: &AuthUser) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        delete_user_data(&txn, session.user_id).await?;
        user::Entity::delete_by_id(session.user_id).exec(&txn).await?;
        txn.commit().await?;

        self.auth.revoke_session(session).await;
        info!(user_id = %session.user_id, "account deleted");
        Ok(())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn logout(&self, session: &AuthUser) -> Result<(), ServiceError> {
        self.auth.revoke_session(session).await;
        self.auth.revoke_user_refresh_tokens(session.user_id).await?;
        Ok(())
    }
}
