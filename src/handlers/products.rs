use crate::{
    auth::{AuthRouterExt, UserRole},
    errors::{ApiError, ErrorResponse},
    extractors::{AppJson, AppPath, AppQuery},
    handlers::{
        common::{created_response, map_service_error, message_response, success_response, PaginationMeta},
        AppState,
    },
    services::products::{
        CreateProductRequest, ListProductsQuery, UpdateProductRequest, UpdateStockRequest,
    },
};
use axum::{
    extract::State,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Routes mounted at `/api/v1/products`
pub fn products_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product));

    let admin = Router::new()
        .route("/", post(create_product))
        .route("/bulk", post(bulk_create_products))
        .route("/:id", put(update_product).delete(delete_product))
        .route("/:id/stock", patch(update_stock))
        .with_role(UserRole::Admin);

    public.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "Products",
    responses((status = 200, description = "One page of products with their variants"))
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListProductsQuery>,
) -> Result<Response, ApiError> {
    let (products, total) = state
        .services
        .products
        .list(&query)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({
        "success": true,
        "count": products.len(),
        "products": products,
        "pagination": PaginationMeta::new(query.page.max(1), query.limit.clamp(1, 100), total),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with variants and rating summary"),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .products
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "product": product })))
}

pub async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .products
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(json!({ "success": true, "product": product })))
}

pub async fn bulk_create_products(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Vec<CreateProductRequest>>,
) -> Result<Response, ApiError> {
    let products = state
        .services
        .products
        .bulk_create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(json!({
        "success": true,
        "message": "Bulk products uploaded successfully",
        "count": products.len(),
        "products": products,
    })))
}

pub async fn update_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .products
        .update(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "product": product })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .products
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Product deleted"))
}

pub async fn update_stock(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateStockRequest>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .products
        .update_stock(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "success": true, "product": product })))
}
