use crate::{
    entities::{product, product_variant, wishlist, wishlist_item},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Saved product with its variants, as listed on the wishlist page.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistProduct {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
    pub added_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    pub products: Vec<WishlistProduct>,
}

/// Adds `product_id` to the user's wishlist, creating the wishlist on first use.
/// Adding a product twice is a no-op.
pub async fn add_product<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<(), ServiceError> {
    let list = match wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        Some(list) => list,
        None => {
            wishlist::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                created_at: Set(Utc::now()),
            }
            .insert(conn)
            .await?
        }
    };

    let exists = wishlist_item::Entity::find()
        .filter(wishlist_item::Column::WishlistId.eq(list.id))
        .filter(wishlist_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .is_some();

    if !exists {
        wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            wishlist_id: Set(list.id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
    }

    Ok(())
}

/// Deletes the user's wishlist and its items.
pub async fn delete_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    if let Some(list) = wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::WishlistId.eq(list.id))
            .exec(conn)
            .await?;
        wishlist::Entity::delete_by_id(list.id).exec(conn).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's saved products, newest first. Empty when no wishlist exists.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid) -> Result<WishlistView, ServiceError> {
        let Some(list) = wishlist::Entity::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(WishlistView { products: vec![] });
        };

        let items = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::WishlistId.eq(list.id))
            .order_by_desc(wishlist_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();

        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut variants: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
        for variant in product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.is_in(product_ids))
            .all(&*self.db)
            .await?
        {
            variants.entry(variant.product_id).or_default().push(variant);
        }

        let products = items
            .into_iter()
            .filter_map(|item| {
                products.get(&item.product_id).map(|p| WishlistProduct {
                    product: p.clone(),
                    variants: variants.remove(&item.product_id).unwrap_or_default(),
                    added_at: item.created_at,
                })
            })
            .collect();

        Ok(WishlistView { products })
    }

    #[instrument(skip(self))]
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistView, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        add_product(&*self.db, user_id, product_id).await?;
        info!(%user_id, %product_id, "product added to wishlist");
        self.get(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistView, ServiceError> {
        let list = wishlist::Entity::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Wishlist"))?;

        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::WishlistId.eq(list.id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        self.get(user_id).await
    }
}
