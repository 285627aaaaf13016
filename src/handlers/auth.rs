use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{created_response, map_service_error, message_response, success_response, with_cookie},
        AppState,
    },
    rate_limiter::RateLimitLayer,
    services::accounts::{
        ChangePasswordRequest, EmailRequest, LoginRequest, PhoneRequest, RefreshRequest,
        RegisterRequest, ResetPasswordRequest, Session, UpdateProfileRequest, VerifyOtpRequest,
    },
};
use axum::{
    extract::State,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::json;
use std::time::Duration;
use tracing::info;

const HOUR: Duration = Duration::from_secs(60 * 60);
const QUARTER_HOUR: Duration = Duration::from_secs(15 * 60);

/// Routes mounted at `/api/v1/auth`
pub fn auth_routes(limits: &RateLimitLayer) -> Router<AppState> {
    let public = Router::new()
        .route(
            "/register",
            post(register).layer(limits.route("register", 5, HOUR)),
        )
        .route(
            "/login/email",
            post(login_with_email).layer(limits.route("login", 10, QUARTER_HOUR)),
        )
        .route("/refresh-token", post(refresh_token))
        .route(
            "/phone-auth/request",
            post(request_phone_otp).layer(limits.route("otp-request", 5, HOUR)),
        )
        .route(
            "/phone-auth/verify",
            post(verify_phone_otp).layer(limits.route("otp-verify", 5, QUARTER_HOUR)),
        )
        .route(
            "/forgot-password",
            post(forgot_password).layer(limits.route("forgot-password", 3, HOUR)),
        )
        .route("/reset-password/:token", post(reset_password))
        .route("/verify-email/:token", get(verify_email).post(verify_email))
        .route("/resend-verification", post(resend_verification));

    let protected = Router::new()
        .route("/me", get(me))
        .route("/check", get(check))
        .route("/profile", patch(update_profile))
        .route(
            "/change-password",
            patch(change_password).layer(limits.route("change-password", 3, HOUR)),
        )
        .route("/delete-account", delete(delete_account))
        .route("/logout", post(logout))
        .with_auth();

    public.merge(protected)
}

/// Body and cookie for a freshly issued session.
fn session_response(state: &AppState, message: &str, session: Session) -> Response {
    let cookie = state
        .services
        .auth
        .session_cookie(&session.tokens.access_token)
        .header_value();
    let body = json!({
        "success": true,
        "message": message,
        "user": session.user,
        "token": session.tokens.access_token,
        "refresh_token": session.tokens.refresh_token,
        "expires_in": session.tokens.expires_in,
    });
    with_cookie(success_response(body), cookie)
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .services
        .accounts
        .register(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(json!({
        "success": true,
        "message": "User registered. Verification email sent.",
        "user": user,
    })))
}

pub async fn login_with_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .accounts
        .login_with_email(payload)
        .await
        .map_err(map_service_error)?;
    info!(user_id = %session.user.id, "login");
    Ok(session_response(&state, "Login successful", session))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .accounts
        .refresh(payload)
        .await
        .map_err(map_service_error)?;
    Ok(session_response(&state, "Token refreshed", session))
}

pub async fn request_phone_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PhoneRequest>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .request_phone_otp(payload)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("OTP sent successfully"))
}

pub async fn verify_phone_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .accounts
        .verify_phone_otp(payload)
        .await
        .map_err(map_service_error)?;
    Ok(session_response(&state, "OTP verified. Login successful.", session))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .forgot_password(payload)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Reset link sent to email"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .reset_password(&token, payload)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Password reset successful"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .verify_email(&token)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Email verified successfully"))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .resend_verification(payload)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Verification email sent"))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    let profile = state
        .services
        .accounts
        .profile(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "user": profile })))
}

/// Lightweight session check for the storefront; does not touch the database.
pub async fn check(user: AuthUser) -> Response {
    success_response(json!({
        "success": true,
        "authenticated": true,
        "user": {
            "_id": user.user_id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
        },
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Response, ApiError> {
    let profile = state
        .services
        .accounts
        .update_profile(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": profile,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .change_password(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Password changed successfully"))
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .delete_account(&user)
        .await
        .map_err(map_service_error)?;
    let cookie = state.services.auth.clear_session_cookie().header_value();
    Ok(with_cookie(message_response("Account deleted successfully"), cookie))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    state
        .services
        .accounts
        .logout(&user)
        .await
        .map_err(map_service_error)?;
    let cookie = state.services.auth.clear_session_cookie().header_value();
    Ok(with_cookie(message_response("Logged out"), cookie))
}
