use crate::{
    auth::{AuthRouterExt, AuthUser, UserRole},
    entities::review::ReviewStatus,
    errors::ApiError,
    extractors::{AppJson, AppPath},
    handlers::{
        common::{created_response, map_service_error, message_response, success_response},
        AppState,
    },
    services::reviews::{ReviewRequest, UpsertOutcome},
};
use axum::{
    extract::State,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ReviewStatusRequest {
    pub status: ReviewStatus,
}

/// Routes mounted at `/api/v1/reviews`
pub fn reviews_routes() -> Router<AppState> {
    let public = Router::new().route("/product/:product_id", get(product_reviews));

    let member = Router::new()
        .route("/", post(upsert_review))
        .route("/:review_id", delete(delete_review))
        .with_auth();

    let admin = Router::new()
        .route("/:review_id/status", patch(update_review_status))
        .with_role(UserRole::Admin);

    public.merge(member).merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/product/{product_id}",
    tag = "Reviews",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Approved reviews with rating statistics"))
)]
pub async fn product_reviews(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    let found = state
        .services
        .reviews
        .for_product(product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "reviews": found.reviews,
        "averageRating": found.stats.average_rating,
        "totalReviews": found.stats.total_reviews,
        "ratingDistribution": found.stats.rating_distribution,
    })))
}

/// One review per user and product: 201 when created, 200 when replaced.
pub async fn upsert_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Response, ApiError> {
    let (review, outcome) = state
        .services
        .reviews
        .upsert(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(match outcome {
        UpsertOutcome::Created => created_response(json!({
            "success": true,
            "message": "Review added",
            "review": review,
        })),
        UpsertOutcome::Updated => success_response(json!({
            "success": true,
            "message": "Review updated",
            "review": review,
        })),
    })
}

pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(review_id): AppPath<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .reviews
        .delete(review_id, user.user_id, user.is_admin())
        .await
        .map_err(map_service_error)?;
    Ok(message_response("Review deleted"))
}

pub async fn update_review_status(
    State(state): State<AppState>,
    AppPath(review_id): AppPath<Uuid>,
    AppJson(payload): AppJson<ReviewStatusRequest>,
) -> Result<Response, ApiError> {
    let review = state
        .services
        .reviews
        .set_status(review_id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "success": true,
        "message": "Review status updated",
        "review": review,
    })))
}
