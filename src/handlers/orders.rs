use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    extractors::{AppJson, AppPath, AppQuery},
    handlers::{
        common::{created_response, map_service_error, success_response},
        AppState,
    },
    services::orders::{CancelOrderRequest, CreateOrderRequest, OrderListQuery, ReturnOrderRequest},
};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Routes mounted at `/api/v1/orders`
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/return", post(request_return))
        .route("/:id/invoice", get(download_invoice))
        .with_auth()
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .create(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(json!({
        "success": true,
        "message": "Order placed successfully",
        "order": order,
    })))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> Result<Response, ApiError> {
    let list = state
        .services
        .orders
        .list(user.user_id, &query)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "orders": list.orders,
        "pagination": list.pagination,
        "summary": list.summary,
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let (order, timeline) = state
        .services
        .orders
        .get(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "order": order,
        "timeline": timeline,
    })))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    payload: Option<AppJson<CancelOrderRequest>>,
) -> Result<Response, ApiError> {
    let reason = payload.and_then(|AppJson(body)| body.reason);
    let order = state
        .services
        .orders
        .cancel(user.user_id, id, reason)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Order cancelled successfully",
        "order": order,
    })))
}

pub async fn request_return(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ReturnOrderRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .request_return(user.user_id, id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Return request submitted successfully",
        "order": order,
    })))
}

pub async fn download_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let (order_number, html) = state
        .services
        .orders
        .invoice(user.user_id, id)
        .await
        .map_err(map_service_error)?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"invoice-{}.html\"",
        order_number
    ))
    .map_err(|_| ApiError::InternalServerError)?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-cache")),
        ],
        html,
    )
        .into_response())
}
