use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{keyed_response, map_service_error, success_response},
        AppState,
    },
};
use axum::{
    extract::State,
    response::Response,
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
}

/// Routes mounted at `/api/v1/wishlist`
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist).post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
        .with_auth()
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let wishlist = state
        .services
        .wishlist
        .get(user.user_id)
        .await
        .map_err(map_service_error)?;
    keyed_response("wishlist", wishlist)
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<WishlistRequest>,
) -> Result<Response, ApiError> {
    let wishlist = state
        .services
        .wishlist
        .add(user.user_id, payload.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Product added to wishlist",
        "wishlist": wishlist,
    })))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(product_id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let wishlist = state
        .services
        .wishlist
        .remove(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Product removed from wishlist",
        "wishlist": wishlist,
    })))
}
