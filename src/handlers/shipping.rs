use crate::{
    auth::{AuthRouterExt, UserRole},
    errors::{ApiError, ErrorResponse},
    extractors::{AppJson, AppPath},
    handlers::{
        common::{data_response, map_service_error, no_content_response, success_response},
        AppState,
    },
    services::shipping::{
        CalculateShippingRequest, CreateZoneRequest, ShippingMethodsRequest, UpdateZoneRequest,
    },
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Routes mounted at `/api/v1/shipping`
pub fn shipping_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/calculate", post(calculate_shipping))
        .route("/methods", post(shipping_methods));

    let member = Router::new()
        .route("/", get(list_zones))
        .route("/:id", get(get_zone))
        .with_auth();

    let admin = Router::new()
        .route("/", post(create_zone))
        .route("/:id", patch(update_zone).delete(delete_zone))
        .with_role(UserRole::Admin);

    public.merge(member).merge(admin)
}

#[utoipa::path(
    post,
    path = "/api/v1/shipping/calculate",
    tag = "Shipping",
    responses(
        (status = 200, description = "Cheapest applicable rate"),
        (status = 404, description = "No zone or rate applies", body = ErrorResponse)
    )
)]
pub async fn calculate_shipping(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CalculateShippingRequest>,
) -> Result<Response, ApiError> {
    let quote = state
        .services
        .shipping
        .calculate(payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, quote))
}

pub async fn shipping_methods(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ShippingMethodsRequest>,
) -> Result<Response, ApiError> {
    let methods = state
        .services
        .shipping
        .methods(payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, methods))
}

pub async fn list_zones(State(state): State<AppState>) -> Result<Response, ApiError> {
    let zones = state
        .services
        .shipping
        .list_active()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "status": "success",
        "results": zones.len(),
        "data": zones,
    })))
}

pub async fn get_zone(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let zone = state
        .services
        .shipping
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, zone))
}

pub async fn create_zone(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateZoneRequest>,
) -> Result<Response, ApiError> {
    let zone = state
        .services
        .shipping
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::CREATED, zone))
}

pub async fn update_zone(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateZoneRequest>,
) -> Result<Response, ApiError> {
    let zone = state
        .services
        .shipping
        .update(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, zone))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .shipping
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
