use crate::{
    auth::{AuthRouterExt, UserRole},
    errors::{ApiError, ErrorResponse},
    extractors::{AppJson, AppPath},
    handlers::{
        common::{data_response, map_service_error, no_content_response, success_response},
        AppState,
    },
    services::currencies::{ConvertRequest, CreateCurrencyRequest, UpdateCurrencyRequest},
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

/// Routes mounted at `/api/v1/currencies`
pub fn currencies_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_currencies))
        .route("/base", get(base_currency))
        .route("/convert", post(convert_amount));

    let admin = Router::new()
        .route("/", post(create_currency))
        .route("/:id", patch(update_currency).delete(delete_currency))
        .route("/:id/set-base", patch(set_base_currency))
        .with_role(UserRole::Admin);

    public.merge(admin)
}

pub async fn list_currencies(State(state): State<AppState>) -> Result<Response, ApiError> {
    let currencies = state
        .services
        .currencies
        .list_active()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "status": "success",
        "results": currencies.len(),
        "data": currencies,
    })))
}

pub async fn base_currency(State(state): State<AppState>) -> Result<Response, ApiError> {
    let base = state
        .services
        .currencies
        .base()
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, base))
}

#[utoipa::path(
    post,
    path = "/api/v1/currencies/convert",
    tag = "Currencies",
    responses(
        (status = 200, description = "Converted amount"),
        (status = 400, description = "Unknown currency code", body = ErrorResponse)
    )
)]
pub async fn convert_amount(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ConvertRequest>,
) -> Result<Response, ApiError> {
    let conversion = state
        .services
        .currencies
        .convert(payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, conversion))
}

pub async fn create_currency(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCurrencyRequest>,
) -> Result<Response, ApiError> {
    let currency = state
        .services
        .currencies
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::CREATED, currency))
}

pub async fn update_currency(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCurrencyRequest>,
) -> Result<Response, ApiError> {
    let currency = state
        .services
        .currencies
        .update(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, currency))
}

pub async fn delete_currency(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .currencies
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub async fn set_base_currency(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let currency = state
        .services
        .currencies
        .set_base(id)
        .await
        .map_err(map_service_error)?;
    Ok(data_response(StatusCode::OK, currency))
}
