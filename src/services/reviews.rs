use crate::{
    auth::user,
    entities::{
        product,
        review::{self, ReviewStatus},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[serde(alias = "product_id")]
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 100, message = "Title cannot exceed 100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "Comment cannot exceed 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub product_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub average_rating: f64,
    pub total_reviews: usize,
    /// Star rating ("1".."5") to count
    pub rating_distribution: BTreeMap<String, usize>,
}

impl ReviewStats {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        let mut distribution: BTreeMap<String, usize> =
            (1..=5).map(|star| (star.to_string(), 0)).collect();
        for rating in ratings {
            if let Some(count) = distribution.get_mut(&rating.to_string()) {
                *count += 1;
            }
        }

        let average = if ratings.is_empty() {
            0.0
        } else {
            let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
            ((sum as f64 / ratings.len() as f64) * 10.0).round() / 10.0
        };

        Self {
            average_rating: average,
            total_reviews: ratings.len(),
            rating_distribution: distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductReviews {
    pub reviews: Vec<ReviewView>,
    pub stats: ReviewStats,
}

/// Whether an upsert inserted a new review or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Approved reviews for a product, newest first.
    #[instrument(skip(self))]
    pub async fn for_product(&self, product_id: Uuid) -> Result<ProductReviews, ServiceError> {
        let reviews = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::Status.eq(ReviewStatus::Approved))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let user_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
        let names: HashMap<Uuid, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();
        let reviews = reviews
            .into_iter()
            .map(|r| ReviewView {
                user_name: names.get(&r.user_id).cloned().unwrap_or_default(),
                id: r.id,
                user_id: r.user_id,
                product_id: r.product_id,
                rating: r.rating,
                title: r.title,
                comment: r.comment,
                created_at: r.created_at,
            })
            .collect();

        Ok(ProductReviews {
            reviews,
            stats: ReviewStats::from_ratings(&ratings),
        })
    }

    /// Creates the caller's review of a product, or updates the one they already wrote.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn upsert(
        &self,
        user_id: Uuid,
        request: ReviewRequest,
    ) -> Result<(review::Model, UpsertOutcome), ServiceError> {
        request.validate()?;

        product::Entity::find_by_id(request.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        let existing = review::Entity::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::ProductId.eq(request.product_id))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(found) => {
                let mut active: review::ActiveModel = found.into();
                active.rating = Set(request.rating);
                active.title = Set(request.title);
                active.comment = Set(request.comment);
                active.updated_at = Set(now);
                let updated = active.update(&*self.db).await?;
                Ok((updated, UpsertOutcome::Updated))
            }
            None => {
                let created = review::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(request.product_id),
                    rating: Set(request.rating),
                    title: Set(request.title),
                    comment: Set(request.comment),
                    status: Set(ReviewStatus::Approved),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
                info!(review_id = %created.id, %user_id, "review created");
                Ok((created, UpsertOutcome::Created))
            }
        }
    }

    /// Owners may delete their own reviews; admins may delete any.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        review_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<(), ServiceError> {
        let found = review::Entity::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Review"))?;

        if found.user_id != user_id && !is_admin {
            return Err(ServiceError::Forbidden(
                "Not authorized to delete this review".to_string(),
            ));
        }

        review::Entity::delete_by_id(review_id).exec(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        review_id: Uuid,
        status: ReviewStatus,
    ) -> Result<review::Model, ServiceError> {
        let found = review::Entity::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Review"))?;

        let mut active: review::ActiveModel = found.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}
