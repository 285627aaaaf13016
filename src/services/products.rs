use crate::{
    entities::{
        cart_item,
        product::{self, ProductCategory, ProductImage},
        product_variant, review, wishlist_item,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_be_non_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VariantInput {
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
    #[validate(custom = "validate_non_negative")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub details: Option<String>,
    pub category: ProductCategory,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[validate(length(min = 1, message = "At least one variant is required"))]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub category: Option<ProductCategory>,
    pub images: Option<Vec<ProductImage>>,
    /// Replaces the whole variant set when present
    #[validate(length(min = 1, message = "At least one variant is required"))]
    pub variants: Option<Vec<VariantInput>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStockRequest {
    pub variant_id: Uuid,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub category: Option<ProductCategory>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl Default for ListProductsQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            category: None,
            sort: ProductSort::default(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    12
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
}

impl CreateProductRequest {
    fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for variant in &self.variants {
            variant.validate()?;
        }
        Ok(())
    }
}

impl UpdateProductRequest {
    fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for variant in self.variants.iter().flatten() {
            variant.validate()?;
        }
        Ok(())
    }
}

impl ProductWithVariants {
    pub fn min_price(&self) -> Option<Decimal> {
        self.variants.iter().map(|v| v.price).min()
    }

    pub fn total_stock(&self) -> i64 {
        self.variants.iter().map(|v| i64::from(v.quantity)).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductWithVariants,
    pub average_rating: f64,
    pub review_count: u64,
}

async fn attach_variants<C: ConnectionTrait>(
    conn: &C,
    products: Vec<product::Model>,
) -> Result<Vec<ProductWithVariants>, ServiceError> {
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut by_product: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
    for variant in product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.is_in(ids))
        .order_by_asc(product_variant::Column::Price)
        .all(conn)
        .await?
    {
        by_product.entry(variant.product_id).or_default().push(variant);
    }

    Ok(products
        .into_iter()
        .map(|product| ProductWithVariants {
            variants: by_product.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect())
}

async fn insert_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variants: Vec<VariantInput>,
) -> Result<(), ServiceError> {
    for v in variants {
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            size: Set(v.size),
            color: Set(v.color),
            price: Set(v.price),
            quantity: Set(v.quantity),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn insert_product<C: ConnectionTrait>(
    conn: &C,
    request: CreateProductRequest,
) -> Result<Uuid, ServiceError> {
    let now = Utc::now();
    let id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(id),
        name: Set(request.name),
        description: Set(request.description),
        details: Set(request.details),
        category: Set(request.category),
        images: Set(serde_json::to_value(&request.images)?),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    insert_variants(conn, id, request.variants).await?;
    Ok(id)
}

/// Case-insensitive keyword match on name, description or category.
fn matches_keyword(product: &product::Model, keyword: &str) -> bool {
    let needle = keyword.to_lowercase();
    let category = match product.category {
        ProductCategory::Men => "men",
        ProductCategory::Women => "women",
    };
    product.name.to_lowercase().contains(&needle)
        || product.description.to_lowercase().contains(&needle)
        || category.contains(&needle)
}

fn variant_matches(variant: &product_variant::Model, query: &SearchQuery) -> bool {
    query.min_price.map_or(true, |min| variant.price >= min)
        && query.max_price.map_or(true, |max| variant.price <= max)
        && query
            .color
            .as_deref()
            .map_or(true, |c| variant.color.eq_ignore_ascii_case(c))
        && query
            .size
            .as_deref()
            .map_or(true, |s| variant.size.eq_ignore_ascii_case(s))
}

/// Catalog reads for everyone, writes for admins.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn filtered(category: Option<ProductCategory>) -> Select<product::Entity> {
        let mut query = product::Entity::find();
        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }
        query
    }

    /// Returns one page of products and the total count.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListProductsQuery,
    ) -> Result<(Vec<ProductWithVariants>, u64), ServiceError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let base = Self::filtered(query.category);

        match query.sort {
            ProductSort::Newest | ProductSort::Name => {
                let ordered = if query.sort == ProductSort::Name {
                    base.order_by_asc(product::Column::Name)
                } else {
                    base.order_by_desc(product::Column::CreatedAt)
                };
                let paginator = ordered.paginate(&*self.db, limit);
                let total = paginator.num_items().await?;
                let products = paginator.fetch_page(page - 1).await?;
                Ok((attach_variants(&*self.db, products).await?, total))
            }
            ProductSort::PriceAsc | ProductSort::PriceDesc => {
                // Ordering by the cheapest variant needs every candidate loaded.
                let products = base
                    .order_by_desc(product::Column::CreatedAt)
                    .all(&*self.db)
                    .await?;
                let mut all = attach_variants(&*self.db, products).await?;
                all.sort_by_key(|p| p.min_price().unwrap_or(Decimal::MAX));
                if query.sort == ProductSort::PriceDesc {
                    all.reverse();
                }
                let total = all.len() as u64;
                let start = ((page - 1) * limit) as usize;
                let items = all.into_iter().skip(start).take(limit as usize).collect();
                Ok((items, total))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        let ratings: Vec<i32> = review::Entity::find()
            .filter(review::Column::ProductId.eq(id))
            .filter(review::Column::Status.eq(review::ReviewStatus::Approved))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|r| r.rating)
            .collect();
        let review_count = ratings.len() as u64;
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            let avg = ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64;
            (avg * 10.0).round() / 10.0
        };

        let mut with_variants = attach_variants(&*self.db, vec![product]).await?;
        let product = with_variants
            .pop()
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        Ok(ProductDetail {
            product,
            average_rating,
            review_count,
        })
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductWithVariants, ServiceError> {
        request.validate_all()?;
        let txn = self.db.begin().await?;
        let id = insert_product(&txn, request).await?;
        txn.commit().await?;

        info!(product_id = %id, "product created");
        self.load(id).await
    }

    /// Creates every product or none of them.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn bulk_create(
        &self,
        requests: Vec<CreateProductRequest>,
    ) -> Result<Vec<ProductWithVariants>, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::BadRequest("No products provided".to_string()));
        }
        for request in &requests {
            request.validate_all()?;
        }

        let txn = self.db.begin().await?;
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            ids.push(insert_product(&txn, request).await?);
        }
        txn.commit().await?;

        info!(count = ids.len(), "bulk products created");
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .order_by_asc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        attach_variants(&*self.db, products).await
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductWithVariants, ServiceError> {
        request.validate_all()?;
        let txn = self.db.begin().await?;

        let existing = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;
        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(details) = request.details {
            active.details = Set(Some(details));
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(images) = request.images {
            active.images = Set(serde_json::to_value(images)?);
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        if let Some(variants) = request.variants {
            product_variant::Entity::delete_many()
                .filter(product_variant::Column::ProductId.eq(id))
                .exec(&txn)
                .await?;
            insert_variants(&txn, id, variants).await?;
        }
        txn.commit().await?;

        self.load(id).await
    }

    /// Deletes the product with its variants and every cart line, wishlist
    /// entry and review that points at it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        review::Entity::delete_many()
            .filter(review::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product_variant::Entity::delete_many()
            .filter(product_variant::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Sets the absolute stock level of one variant.
    #[instrument(skip(self))]
    pub async fn update_stock(
        &self,
        id: Uuid,
        request: UpdateStockRequest,
    ) -> Result<ProductWithVariants, ServiceError> {
        request.validate()?;
        let variant = product_variant::Entity::find_by_id(request.variant_id)
            .one(&*self.db)
            .await?
            .filter(|v| v.product_id == id)
            .ok_or_else(|| ServiceError::not_found("Product variant"))?;

        let mut active: product_variant::ActiveModel = variant.into();
        active.quantity = Set(request.quantity);
        active.update(&*self.db).await?;

        info!(product_id = %id, variant_id = %request.variant_id, quantity = request.quantity, "stock updated");
        self.load(id).await
    }

    /// Keyword and variant-attribute search, newest first.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<ProductWithVariants>, ServiceError> {
        let candidates = Self::filtered(query.category)
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let keyword = query.keyword.as_deref().map(str::trim).unwrap_or_default();
        let candidates: Vec<product::Model> = candidates
            .into_iter()
            .filter(|p| keyword.is_empty() || matches_keyword(p, keyword))
            .collect();

        let needs_variant_match = query.min_price.is_some()
            || query.max_price.is_some()
            || query.color.is_some()
            || query.size.is_some();

        Ok(attach_variants(&*self.db, candidates)
            .await?
            .into_iter()
            .filter(|p| !needs_variant_match || p.variants.iter().any(|v| variant_matches(v, query)))
            .collect())
    }

    async fn load(&self, id: Uuid) -> Result<ProductWithVariants, ServiceError> {
        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;
        attach_variants(&*self.db, vec![product])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Product"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_product() -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            name: "Linen Shirt".into(),
            description: "Breathable summer shirt".into(),
            details: None,
            category: ProductCategory::Men,
            images: serde_json::json!([]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(size: &str, color: &str, price: Decimal) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            size: size.into(),
            color: color.into(),
            price,
            quantity: 3,
        }
    }

    #[test]
    fn keyword_matches_name_description_and_category() {
        let p = sample_product();
        assert!(matches_keyword(&p, "linen"));
        assert!(matches_keyword(&p, "SUMMER"));
        assert!(matches_keyword(&p, "men"));
        assert!(!matches_keyword(&p, "saree"));
    }

    #[test]
    fn variant_filters_combine() {
        let v = variant("M", "Blue", dec!(799));
        let query = SearchQuery {
            min_price: Some(dec!(500)),
            max_price: Some(dec!(1000)),
            color: Some("blue".into()),
            size: Some("m".into()),
            ..Default::default()
        };
        assert!(variant_matches(&v, &query));

        let too_cheap = SearchQuery {
            max_price: Some(dec!(700)),
            ..Default::default()
        };
        assert!(!variant_matches(&v, &too_cheap));
    }

    #[test]
    fn create_request_requires_a_variant() {
        let request = CreateProductRequest {
            name: "Kurta".into(),
            description: "Cotton kurta".into(),
            details: None,
            category: ProductCategory::Women,
            images: vec![],
            variants: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn negative_variant_price_is_rejected() {
        let request = CreateProductRequest {
            name: "Kurta".into(),
            description: "Cotton kurta".into(),
            details: None,
            category: ProductCategory::Women,
            images: vec![],
            variants: vec![VariantInput {
                size: "S".into(),
                color: "Red".into(),
                price: dec!(-1),
                quantity: 1,
            }],
        };
        assert!(request.validate_all().is_err());
    }

    #[test]
    fn sort_parses_snake_case() {
        let q: ListProductsQuery =
            serde_json::from_value(serde_json::json!({ "sort": "price_desc" })).unwrap();
        assert_eq!(q.sort, ProductSort::PriceDesc);
        assert_eq!(q.limit, 12);
    }
}
