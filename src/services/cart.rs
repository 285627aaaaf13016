use crate::{
    config::AppConfig,
    entities::{cart, cart_item, product, product_variant},
    errors::ServiceError,
    services::wishlist,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Tax and shipping parameters applied to every cart summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingRules {
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub standard_shipping_fee: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            tax_rate: dec!(0.10),
            free_shipping_threshold: dec!(50),
            standard_shipping_fee: dec!(5),
        }
    }
}

impl From<&AppConfig> for PricingRules {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            tax_rate: cfg.tax_rate,
            free_shipping_threshold: cfg.free_shipping_threshold,
            standard_shipping_fee: cfg.standard_shipping_fee,
        }
    }
}

/// Totals shown next to the cart and used as the order total at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub item_count: i64,
    pub free_shipping_threshold: Decimal,
    pub remaining_for_free_shipping: Decimal,
}

impl CartSummary {
    /// `lines` are `(unit price, quantity)` pairs.
    pub fn compute(lines: &[(Decimal, i32)], rules: &PricingRules) -> Self {
        let subtotal: Decimal = lines
            .iter()
            .map(|(price, qty)| *price * Decimal::from(*qty))
            .sum();
        let item_count: i64 = lines.iter().map(|(_, qty)| i64::from(*qty)).sum();

        let tax = subtotal * rules.tax_rate;
        let shipping = if lines.is_empty() || subtotal > rules.free_shipping_threshold {
            Decimal::ZERO
        } else {
            rules.standard_shipping_fee
        };
        let remaining = (rules.free_shipping_threshold - subtotal).max(Decimal::ZERO);

        Self {
            subtotal: subtotal.round_dp(2),
            tax: tax.round_dp(2),
            shipping: shipping.round_dp(2),
            total: (subtotal + tax + shipping).round_dp(2),
            item_count,
            free_shipping_threshold: rules.free_shipping_threshold,
            remaining_for_free_shipping: remaining.round_dp(2),
        }
    }

    pub fn empty(rules: &PricingRules) -> Self {
        Self::compute(&[], rules)
    }
}

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    /// Value of the `guest_cart` cookie
    Guest(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
    pub product_name: String,
    pub image: Option<String>,
    pub size: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub summary: CartSummary,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    owner: &CartOwner,
) -> Result<Option<cart::Model>, ServiceError> {
    let query = match owner {
        CartOwner::User(user_id) => cart::Entity::find().filter(cart::Column::UserId.eq(*user_id)),
        CartOwner::Guest(token) => {
            cart::Entity::find().filter(cart::Column::GuestToken.eq(token.clone()))
        }
    };
    Ok(query.one(conn).await?)
}

async fn find_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    owner: &CartOwner,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = find_cart(conn, owner).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let (user_id, guest_token) = match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Guest(token) => (None, Some(token.clone())),
    };
    let created = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        guest_token: Set(guest_token),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(created)
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
    variant_id: Uuid,
) -> Result<Option<cart_item::Model>, ServiceError> {
    Ok(cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .filter(cart_item::Column::VariantId.eq(variant_id))
        .one(conn)
        .await?)
}

/// Loads the variant and makes sure it belongs to `product_id`.
async fn load_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Uuid,
) -> Result<product_variant::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Product"))?;

    product_variant::Entity::find_by_id(variant_id)
        .one(conn)
        .await?
        .filter(|v| v.product_id == product_id)
        .ok_or_else(|| ServiceError::not_found("Product variant"))
}

fn insufficient_stock(variant: &product_variant::Model) -> ServiceError {
    ServiceError::InsufficientStock {
        message: "Insufficient stock".to_string(),
        available: variant.quantity,
    }
}

async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: &cart::Model) -> Result<(), ServiceError> {
    let mut active: cart::ActiveModel = cart.clone().into();
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

/// Deletes the user's cart and all of its lines.
pub async fn delete_user_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    if let Some(existing) = find_cart(conn, &CartOwner::User(user_id)).await? {
        delete_cart(conn, existing.id).await?;
    }
    Ok(())
}

async fn delete_cart<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<(), ServiceError> {
    cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    cart::Entity::delete_by_id(cart_id).exec(conn).await?;
    Ok(())
}

/// Cart operations for signed-in users and cookie-identified guests.
///
/// Every write re-checks the variant's stock and refreshes the line's price
/// snapshot from the current variant price.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    rules: PricingRules,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, rules: PricingRules) -> Self {
        Self { db, rules }
    }

    /// Returns the cart with product details; an empty view when no cart exists.
    #[instrument(skip(self))]
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView, ServiceError> {
        match find_cart(&*self.db, owner).await? {
            Some(existing) => self.render(existing.id).await,
            None => Ok(CartView {
                items: vec![],
                summary: CartSummary::empty(&self.rules),
            }),
        }
    }

    async fn render(&self, cart_id: Uuid) -> Result<CartView, ServiceError> {
        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let variant_ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();

        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let variants: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
            .filter(product_variant::Column::Id.is_in(variant_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        let items: Vec<CartLineView> = lines
            .into_iter()
            .map(|line| {
                let product = products.get(&line.product_id);
                let variant = variants.get(&line.variant_id);
                CartLineView {
                    id: line.id,
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    price: line.price,
                    line_total: line.price * Decimal::from(line.quantity),
                    product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    image: product.and_then(|p| p.first_image_url()),
                    size: variant.map(|v| v.size.clone()).unwrap_or_default(),
                    color: variant.map(|v| v.color.clone()).unwrap_or_default(),
                }
            })
            .collect();

        let priced: Vec<(Decimal, i32)> = items.iter().map(|i| (i.price, i.quantity)).collect();
        Ok(CartView {
            summary: CartSummary::compute(&priced, &self.rules),
            items,
        })
    }

    /// Adds `quantity` of a variant, merging with an existing line.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        request: AddToCartRequest,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let variant = load_variant(&txn, request.product_id, request.variant_id).await?;
        let cart = find_or_create_cart(&txn, owner).await?;
        let existing = find_line(&txn, cart.id, request.product_id, request.variant_id).await?;

        let current = existing.as_ref().map(|l| l.quantity).unwrap_or(0);
        let wanted = current + request.quantity;
        if wanted > variant.quantity {
            return Err(insufficient_stock(&variant));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(wanted);
                active.price = Set(variant.price);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(request.product_id),
                    variant_id: Set(request.variant_id),
                    quantity: Set(wanted),
                    price: Set(variant.price),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }
        touch_cart(&txn, &cart).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, variant_id = %request.variant_id, quantity = wanted, "cart line added");
        self.render(cart.id).await
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = find_cart(&txn, owner)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart"))?;
        let line = find_line(&txn, cart.id, product_id, variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        let variant = load_variant(&txn, product_id, variant_id).await?;
        if quantity > variant.quantity {
            return Err(insufficient_stock(&variant));
        }

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.price = Set(variant.price);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        touch_cart(&txn, &cart).await?;
        txn.commit().await?;

        self.render(cart.id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        variant_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = find_cart(&*self.db, owner)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart"))?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(cart_item::Column::VariantId.eq(variant_id))
            .exec(&*self.db)
            .await?;
        touch_cart(&*self.db, &cart).await?;

        self.render(cart.id).await
    }

    /// Empties the cart but keeps the cart row.
    #[instrument(skip(self))]
    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, ServiceError> {
        if let Some(existing) = find_cart(&*self.db, owner).await? {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(existing.id))
                .exec(&*self.db)
                .await?;
            touch_cart(&*self.db, &existing).await?;
        }
        Ok(CartView {
            items: vec![],
            summary: CartSummary::empty(&self.rules),
        })
    }

    /// Moves a line to the user's wishlist.
    #[instrument(skip(self))]
    pub async fn save_for_later(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        variant_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = find_cart(&txn, &CartOwner::User(user_id))
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart"))?;
        let line = find_line(&txn, cart.id, product_id, variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;

        cart_item::Entity::delete_by_id(line.id).exec(&txn).await?;
        wishlist::add_product(&txn, user_id, product_id).await?;
        touch_cart(&txn, &cart).await?;
        txn.commit().await?;

        self.render(cart.id).await
    }

    /// Folds the guest cart into the user's cart and deletes the guest cart.
    ///
    /// Merged quantities are capped at the variant's current stock; lines whose
    /// variant has disappeared or sold out are dropped.
    #[instrument(skip(self, guest_token))]
    pub async fn merge_guest_cart(
        &self,
        user_id: Uuid,
        guest_token: &str,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let Some(guest) = find_cart(&txn, &CartOwner::Guest(guest_token.to_string())).await? else {
            txn.commit().await?;
            return self.view(&CartOwner::User(user_id)).await;
        };
        let user_cart = find_or_create_cart(&txn, &CartOwner::User(user_id)).await?;

        let guest_lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(guest.id))
            .all(&txn)
            .await?;

        let mut merged = 0usize;
        for line in guest_lines {
            let Some(variant) = product_variant::Entity::find_by_id(line.variant_id)
                .one(&txn)
                .await?
            else {
                continue;
            };

            let now = Utc::now();
            match find_line(&txn, user_cart.id, line.product_id, line.variant_id).await? {
                Some(existing) => {
                    let quantity = (existing.quantity + line.quantity).min(variant.quantity);
                    let mut active: cart_item::ActiveModel = existing.into();
                    active.quantity = Set(quantity);
                    active.price = Set(variant.price);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                }
                None => {
                    let quantity = line.quantity.min(variant.quantity);
                    if quantity < 1 {
                        continue;
                    }
                    cart_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        cart_id: Set(user_cart.id),
                        product_id: Set(line.product_id),
                        variant_id: Set(line.variant_id),
                        quantity: Set(quantity),
                        price: Set(variant.price),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(&txn)
                    .await?;
                }
            }
            merged += 1;
        }

        delete_cart(&txn, guest.id).await?;
        touch_cart(&txn, &user_cart).await?;
        txn.commit().await?;

        info!(%user_id, merged, "guest cart merged");
        self.render(user_cart.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_carts_pay_standard_shipping() {
        let summary = CartSummary::compute(&[(dec!(20), 2)], &PricingRules::default());
        assert_eq!(summary.subtotal, dec!(40));
        assert_eq!(summary.tax, dec!(4.00));
        assert_eq!(summary.shipping, dec!(5));
        assert_eq!(summary.total, dec!(49.00));
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.remaining_for_free_shipping, dec!(10));
    }

    #[test]
    fn shipping_is_free_strictly_above_threshold() {
        let rules = PricingRules::default();
        let at = CartSummary::compute(&[(dec!(50), 1)], &rules);
        assert_eq!(at.shipping, dec!(5));
        assert_eq!(at.remaining_for_free_shipping, Decimal::ZERO);

        let above = CartSummary::compute(&[(dec!(50.01), 1)], &rules);
        assert_eq!(above.shipping, Decimal::ZERO);
    }

    #[test]
    fn empty_cart_has_no_shipping() {
        let summary = CartSummary::empty(&PricingRules::default());
        assert_eq!(summary.total, Decimal::ZERO);
        assert_eq!(summary.shipping, Decimal::ZERO);
        assert_eq!(summary.remaining_for_free_shipping, dec!(50));
    }

    #[test]
    fn summary_serializes_camel_case() {
        let json = serde_json::to_value(CartSummary::empty(&PricingRules::default())).unwrap();
        assert!(json.get("itemCount").is_some());
        assert!(json.get("remainingForFreeShipping").is_some());
        assert!(json.get("freeShippingThreshold").is_some());
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_tax_plus_shipping(
            lines in proptest::collection::vec((1i64..100_000, 1i32..20), 0..8)
        ) {
            let lines: Vec<(Decimal, i32)> =
                lines.into_iter().map(|(cents, qty)| (Decimal::new(cents, 2), qty)).collect();
            let rules = PricingRules::default();
            let s = CartSummary::compute(&lines, &rules);

            prop_assert!(s.remaining_for_free_shipping >= Decimal::ZERO);
            prop_assert!(s.shipping == Decimal::ZERO || s.shipping == rules.standard_shipping_fee);
            prop_assert!((s.subtotal + s.tax + s.shipping - s.total).abs() <= dec!(0.01));
            prop_assert_eq!(s.item_count, lines.iter().map(|(_, q)| i64::from(*q)).sum::<i64>());
        }
    }
}
