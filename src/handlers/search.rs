use crate::{
    errors::ApiError,
    extractors::AppQuery,
    handlers::{
        common::{map_service_error, success_response},
        AppState,
    },
    services::products::SearchQuery,
};
use axum::{extract::State, response::Response, routing::get, Router};
use serde_json::json;

/// Routes mounted at `/api/v1/search`
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/", get(search_products))
}

#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "Products",
    responses((status = 200, description = "Matching products, newest first"))
)]
pub async fn search_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Response, ApiError> {
    let products = state
        .services
        .products
        .search(&query)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "count": products.len(),
        "products": products,
    })))
}
