use crate::{
    auth::{cookies::read_cookie, AuthRouterExt, AuthUser, CookieBuilder, MaybeUser, GUEST_CART_COOKIE},
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{map_service_error, success_response, with_cookie},
        AppState,
    },
    services::cart::{AddToCartRequest, CartOwner, CartView, UpdateCartItemRequest},
};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

const GUEST_CART_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Routes mounted at `/api/v1/cart`
pub fn cart_routes() -> Router<AppState> {
    let session = Router::new()
        .route("/", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route(
            "/:product_id/:variant_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .with_optional_auth();

    let member = Router::new()
        .route("/:product_id/:variant_id/save-for-later", post(save_for_later))
        .route("/merge-guest-cart", post(merge_guest_cart))
        .with_auth();

    session.merge(member)
}

/// The cart a request acts on, and the cookie to set when a guest cart is new.
fn resolve_owner(
    state: &AppState,
    user: &MaybeUser,
    headers: &HeaderMap,
    create: bool,
) -> (CartOwner, Option<HeaderValue>) {
    if let Some(user) = &user.0 {
        return (CartOwner::User(user.user_id), None);
    }
    match read_cookie(headers, GUEST_CART_COOKIE) {
        Some(token) => (CartOwner::Guest(token), None),
        None if create => {
            let token = Uuid::new_v4().simple().to_string();
            let cookie = CookieBuilder::new(GUEST_CART_COOKIE, token.clone())
                .max_age(GUEST_CART_MAX_AGE)
                .secure(state.config.is_production())
                .header_value();
            (CartOwner::Guest(token), cookie)
        }
        None => (CartOwner::Guest(String::new()), None),
    }
}

fn cart_response(message: Option<&str>, view: CartView) -> Response {
    let mut body = json!({
        "success": true,
        "items": view.items,
        "summary": view.summary,
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    success_response(body)
}

pub async fn get_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, _) = resolve_owner(&state, &user, &headers, false);
    let view = state
        .services
        .cart
        .view(&owner)
        .await
        .map_err(map_service_error)?;
    Ok(cart_response(None, view))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let (owner, cookie) = resolve_owner(&state, &user, &headers, true);
    let view = state
        .services
        .cart
        .add_item(&owner, payload)
        .await
        .map_err(map_service_error)?;
    Ok(with_cookie(cart_response(Some("Item added to cart"), view), cookie))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    AppPath((product_id, variant_id)): AppPath<(Uuid, Uuid)>,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let (owner, _) = resolve_owner(&state, &user, &headers, false);
    let view = state
        .services
        .cart
        .update_item(&owner, product_id, variant_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(cart_response(Some("Cart updated"), view))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    AppPath((product_id, variant_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let (owner, _) = resolve_owner(&state, &user, &headers, false);
    let view = state
        .services
        .cart
        .remove_item(&owner, product_id, variant_id)
        .await
        .map_err(map_service_error)?;
    Ok(cart_response(Some("Item removed from cart"), view))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, _) = resolve_owner(&state, &user, &headers, false);
    let view = state
        .services
        .cart
        .clear(&owner)
        .await
        .map_err(map_service_error)?;
    Ok(cart_response(Some("Cart cleared"), view))
}

pub async fn save_for_later(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath((product_id, variant_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .save_for_later(user.user_id, product_id, variant_id)
        .await
        .map_err(map_service_error)?;
    Ok(cart_response(Some("Item saved for later"), view))
}

pub async fn merge_guest_cart(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(token) = read_cookie(&headers, GUEST_CART_COOKIE) else {
        let view = state
            .services
            .cart
            .view(&CartOwner::User(user.user_id))
            .await
            .map_err(map_service_error)?;
        return Ok(cart_response(Some("No guest cart to merge"), view));
    };

    let view = state
        .services
        .cart
        .merge_guest_cart(user.user_id, &token)
        .await
        .map_err(map_service_error)?;
    let cookie =
        CookieBuilder::removal(GUEST_CART_COOKIE, state.config.is_production()).header_value();
    Ok(with_cookie(cart_response(Some("Guest cart merged"), view), cookie))
}
