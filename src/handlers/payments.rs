use crate::{
    auth::{AuthRouterExt, AuthUser, UserRole},
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{map_service_error, success_response},
        AppState,
    },
    services::payments::{
        CreatePaymentOrderRequest, PaymentFailureRequest, RefundRequest, VerifyPaymentRequest,
    },
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};
use serde_json::json;

/// Routes mounted at `/api/v1/payments`
pub fn payment_routes() -> Router<AppState> {
    let customer = Router::new()
        .route("/create-order", post(create_payment_order))
        .route("/verify", post(verify_payment))
        .route("/failure", post(record_payment_failure))
        .route("/:payment_id", get(payment_status))
        .with_auth();

    let admin = Router::new()
        .route("/:payment_id/refund", post(refund_payment))
        .with_role(UserRole::Admin);

    customer.merge(admin)
}

pub async fn create_payment_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreatePaymentOrderRequest>,
) -> Result<Response, ApiError> {
    let created = state
        .services
        .payments
        .create_order(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "order": created.order,
        "key_id": created.key_id,
    })))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<VerifyPaymentRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .payments
        .verify(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Payment verified successfully",
        "order": order,
    })))
}

pub async fn record_payment_failure(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentFailureRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .payments
        .record_failure(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Payment failure recorded",
        "order": order,
    })))
}

pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(payment_id): AppPath<String>,
) -> Result<Response, ApiError> {
    let payment = state
        .services
        .payments
        .status(user.user_id, &payment_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "payment": payment })))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    AppPath(payment_id): AppPath<String>,
    payload: Option<AppJson<RefundRequest>>,
) -> Result<Response, ApiError> {
    let amount = payload.and_then(|AppJson(body)| body.amount);
    let payment = state
        .services
        .payments
        .refund(&payment_id, amount)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Refund processed",
        "payment": payment,
    })))
}
