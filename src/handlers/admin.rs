use crate::{
    auth::{AuthRouterExt, AuthUser, UserRole},
    errors::ApiError,
    extractors::{AppJson, AppPath, AppQuery},
    handlers::{
        common::{map_service_error, message_response, success_response, PaginationMeta},
        AppState,
    },
    services::admin::{
        ActivityQuery, AnalyticsQuery, BulkRoleRequest, DashboardQuery, RoleRequest,
        StatusRequest, UserListQuery,
    },
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, put},
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Routes mounted at `/api/v1/admin`; every route requires the admin role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/activity", get(user_activity))
        .route("/users/bulk-role", put(bulk_update_roles))
        .route("/users/:id", get(user_detail).delete(delete_user))
        .route("/users/:id/role", put(update_user_role))
        .route("/orders/analytics", get(order_analytics))
        .route("/orders/:id/status", put(update_order_status))
        .route("/inventory", get(inventory))
        .route("/system-health", get(system_health))
        .with_role(UserRole::Admin)
}

pub async fn dashboard(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DashboardQuery>,
) -> Result<Response, ApiError> {
    let dashboard = state
        .services
        .admin
        .dashboard(query.time_range)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "data": dashboard })))
}

pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Response, ApiError> {
    let (users, total) = state
        .services
        .admin
        .list_users(&query)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "users": users,
        "pagination": PaginationMeta::new(query.page.max(1), query.limit.clamp(1, 100), total),
    })))
}

pub async fn user_detail(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let detail = state
        .services
        .admin
        .user_detail(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "user": detail.user,
        "orders": detail.orders,
        "reviews": detail.reviews,
    })))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    admin: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<RoleRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .services
        .admin
        .update_role(admin.user_id, id, &payload.role)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": format!("User role updated to {}", user.role.as_str()),
        "user": user,
    })))
}

pub async fn bulk_update_roles(
    State(state): State<AppState>,
    admin: AuthUser,
    AppJson(payload): AppJson<BulkRoleRequest>,
) -> Result<Response, ApiError> {
    let role = payload.role.clone();
    let modified = state
        .services
        .admin
        .bulk_update_roles(admin.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": format!("Updated {} user roles to {}", modified, role),
        "modifiedCount": modified,
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .admin
        .delete_user(admin.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("User and associated data deleted successfully"))
}

pub async fn order_analytics(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let analytics = state
        .services
        .admin
        .order_analytics(query.timeframe)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "data": analytics })))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<StatusRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .admin
        .set_order_status(id, &payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": format!("Order status updated to {}", payload.status),
        "order": order,
    })))
}

pub async fn inventory(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state
        .services
        .admin
        .inventory()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "data": report })))
}

pub async fn user_activity(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> Result<Response, ApiError> {
    let activity = state
        .services
        .admin
        .user_activity(query.days)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "data": activity })))
}

pub async fn system_health(State(state): State<AppState>) -> Response {
    let health = state.services.admin.system_health().await;
    success_response(json!({ "success": true, "data": health }))
}
