use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{created_response, map_service_error, message_response, success_response},
        AppState,
    },
    services::addresses::{CreateAddressRequest, UpdateAddressRequest},
};
use axum::{
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use uuid::Uuid;

/// Routes mounted at `/api/v1/addresses`
pub fn addresses_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route(
            "/:id",
            get(get_address).put(update_address).delete(delete_address),
        )
        .with_auth()
}

pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let addresses = state
        .services
        .addresses
        .list(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(addresses))
}

pub async fn get_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .addresses
        .get(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(address))
}

pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateAddressRequest>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .addresses
        .create(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(address))
}

pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateAddressRequest>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .addresses
        .update(user.user_id, id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .addresses
        .delete(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Address deleted successfully"))
}
