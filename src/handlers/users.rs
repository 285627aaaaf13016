use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    extractors::AppJson,
    handlers::{
        common::{map_service_error, success_response},
        AppState,
    },
    services::accounts::UpdateProfileRequest,
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, put},
    Router,
};
use serde_json::json;

/// Routes mounted at `/api/v1/users`
pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/update", put(update_me))
        .with_auth()
}

pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    let profile = state
        .services
        .accounts
        .profile(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "user": profile })))
}

pub async fn update_me(
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
