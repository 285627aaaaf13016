use crate::{
    auth::user,
    entities::{
        address, cart, cart_item,
        order::{self, OrderStatus, PaymentMethod, PaymentStatus, ReturnStatus},
        order_item, product, product_variant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::{delete_user_cart, CartSummary, PricingRules},
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderLineInput {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
    #[serde(alias = "variantId")]
    pub variant_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[serde(alias = "addressId", alias = "address")]
    pub address_id: Uuid,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<PaymentMethod>,
    /// Falls back to the caller's cart when omitted
    #[serde(default)]
    pub items: Option<Vec<OrderLineInput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReturnOrderRequest {
    #[validate(length(min = 1, max = 500, message = "Return reason is required"))]
    pub reason: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
}

impl Default for OrderListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            status: None,
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub address: Option<address::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub status: String,
    pub date: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_orders: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub status: OrderStatus,
    pub count: u64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistorySummary {
    pub orders_by_status: Vec<StatusTotals>,
    pub total_orders: u64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderWithItems>,
    pub pagination: OrderPagination,
    pub summary: OrderHistorySummary,
}

fn order_number_prefix(now: DateTime<Utc>) -> String {
    format!("ORD{:02}{:02}", now.year() % 100, now.month())
}

/// `ORD{yy}{mm}{NNNN}`; `sequence` is 1-based within the month.
pub fn format_order_number(now: DateTime<Utc>, sequence: u64) -> String {
    format!("{}{:04}", order_number_prefix(now), sequence)
}

/// One past the highest sequence already issued under `prefix`.
///
/// Orders can be deleted, so the month's order count is not a safe source.
fn next_sequence(prefix: &str, issued: &[String]) -> u64 {
    issued
        .iter()
        .filter_map(|number| number.strip_prefix(prefix)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

async fn next_order_number<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let prefix = order_number_prefix(now);
    let issued: Vec<String> = order::Entity::find()
        .select_only()
        .column(order::Column::OrderNumber)
        .filter(order::Column::OrderNumber.starts_with(prefix.as_str()))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(format_order_number(now, next_sequence(&prefix, &issued)))
}

/// Three to five days out.
pub fn estimated_delivery(now: DateTime<Utc>) -> DateTime<Utc> {
    let days = rand::thread_rng().gen_range(3..=5);
    now + Duration::days(days)
}

/// Human-readable history of an order, newest entry first.
pub fn build_timeline(order: &order::Model) -> Vec<TimelineEntry> {
    let mut timeline = vec![TimelineEntry {
        status: "Order Placed".to_string(),
        date: order.created_at,
        description: format!("Order #{} placed successfully", order.order_number),
    }];

    if order.payment_status == PaymentStatus::Paid {
        timeline.push(TimelineEntry {
            status: "Payment Confirmed".to_string(),
            date: order.updated_at,
            description: format!(
                "Payment of ₹{} received via {}",
                order.total_amount.round_dp(2),
                payment_method_label(order.payment_method)
            ),
        });
    }

    match order.order_status {
        OrderStatus::Processing => timeline.push(TimelineEntry {
            status: "Processing".to_string(),
            date: order.updated_at,
            description: "Order is being processed".to_string(),
        }),
        OrderStatus::Shipped => timeline.push(TimelineEntry {
            status: "Shipped".to_string(),
            date: order.updated_at,
            description: "Order has been shipped".to_string(),
        }),
        OrderStatus::Delivered => timeline.push(TimelineEntry {
            status: "Delivered".to_string(),
            date: order.updated_at,
            description: "Order has been delivered".to_string(),
        }),
        OrderStatus::Cancelled => timeline.push(TimelineEntry {
            status: "Cancelled".to_string(),
            date: order.cancelled_at.unwrap_or(order.updated_at),
            description: match &order.cancellation_reason {
                Some(reason) if !reason.is_empty() => format!("Order cancelled: {}", reason),
                _ => "Order cancelled".to_string(),
            },
        }),
        OrderStatus::Pending => {}
    }

    if let Some(requested_at) = order.return_requested_at {
        timeline.push(TimelineEntry {
            status: "Return Requested".to_string(),
            date: requested_at,
            description: format!(
                "Return requested: {}",
                order.return_reason.as_deref().unwrap_or_default()
            ),
        });
    }

    timeline.sort_by(|a, b| b.date.cmp(&a.date));
    timeline
}

pub fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "COD",
        PaymentMethod::Upi => "UPI",
        PaymentMethod::NetBanking => "NetBanking",
        PaymentMethod::Card => "Card",
    }
}

/// Checks the return rules; `window_days` counts from the last order update.
pub fn check_return_eligibility(
    order: &order::Model,
    now: DateTime<Utc>,
    window_days: i64,
) -> Result<(), ServiceError> {
    if order.order_status != OrderStatus::Delivered {
        return Err(ServiceError::BadRequest(
            "Return can only be requested for delivered orders".to_string(),
        ));
    }
    if order.return_status.is_some() {
        return Err(ServiceError::BadRequest(
            "Return already requested for this order".to_string(),
        ));
    }
    if now - order.updated_at > Duration::days(window_days) {
        return Err(ServiceError::BadRequest(
            "Return window has expired".to_string(),
        ));
    }
    Ok(())
}

/// Takes `quantity` units from a variant only while enough stock remains.
async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> Result<bool, ServiceError> {
    let result = product_variant::Entity::update_many()
        .col_expr(
            product_variant::Column::Quantity,
            Expr::col(product_variant::Column::Quantity).sub(quantity),
        )
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::Quantity.gte(quantity))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Puts every line of `order_id` back into stock.
pub async fn restore_stock<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<(), ServiceError> {
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;
    for item in items {
        product_variant::Entity::update_many()
            .col_expr(
                product_variant::Column::Quantity,
                Expr::col(product_variant::Column::Quantity).add(item.quantity),
            )
            .filter(product_variant::Column::Id.eq(item.variant_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// Marks the order cancelled and restores its stock. The caller owns the transaction.
pub async fn cancel_in_txn<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
    reason: Option<String>,
) -> Result<order::Model, ServiceError> {
    restore_stock(conn, order.id).await?;

    let now = Utc::now();
    let mut active: order::ActiveModel = order.into();
    active.order_status = Set(OrderStatus::Cancelled);
    active.cancellation_reason = Set(reason);
    active.cancelled_at = Set(Some(now));
    active.updated_at = Set(now);
    Ok(active.update(conn).await?)
}

/// Deletes orders (with their lines) placed by `user_id`.
/// Deletes a user's orders, first returning stock still held by unshipped ones.
pub async fn delete_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    let orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .all(conn)
        .await?;
    if orders.is_empty() {
        return Ok(());
    }
    for held in orders.iter().filter(|o| o.order_status.is_cancellable()) {
        restore_stock(conn, held.id).await?;
    }

    let ids: Vec<Uuid> = orders.into_iter().map(|o| o.id).collect();
    order_item::Entity::delete_many()
        .filter(order_item::Column::OrderId.is_in(ids.clone()))
        .exec(conn)
        .await?;
    order::Entity::delete_many()
        .filter(order::Column::Id.is_in(ids))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn attach_items<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderWithItems>, ServiceError> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let address_ids: Vec<Uuid> = orders.iter().map(|o| o.address_id).collect();

    let mut items: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
    for item in order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .all(conn)
        .await?
    {
        items.entry(item.order_id).or_default().push(item);
    }
    let addresses: HashMap<Uuid, address::Model> = address::Entity::find()
        .filter(address::Column::Id.is_in(address_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: items.remove(&order.id).unwrap_or_default(),
            address: addresses.get(&order.address_id).cloned(),
            order,
        })
        .collect())
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Printable HTML invoice for an order.
pub fn render_invoice(order: &OrderWithItems, customer_email: &str, issued: DateTime<Utc>) -> String {
    let o = &order.order;
    let subtotal: Decimal = order.items.iter().map(|i| i.line_total()).sum();
    let charges = (o.total_amount - subtotal).max(Decimal::ZERO);

    let rows: String = order
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}<br><small>Size: {}</small><br><small>Color: {}</small></td>\
                 <td>{}</td><td>₹{:.2}</td><td>₹{:.2}</td></tr>",
                html_escape(&item.product_name),
                html_escape(&item.size),
                html_escape(&item.color),
                item.quantity,
                item.price,
                item.line_total()
            )
        })
        .collect();

    let bill_to = match &order.address {
        Some(a) => format!(
            "<p><strong>{}</strong></p><p>{}</p><p>{}, {} {}</p><p>Phone: {}</p>",
            html_escape(&a.full_name),
            html_escape(&a.address_line1),
            html_escape(&a.city),
            html_escape(&a.state),
            html_escape(&a.pincode),
            html_escape(&a.mobile_number)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Invoice - {number}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 0; padding: 20px; }}
table {{ width: 100%; border-collapse: collapse; margin-bottom: 20px; }}
th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
.total-row {{ font-weight: bold; }}
</style>
</head>
<body>
<h1>INVOICE</h1>
<div>
<h3>Bill To:</h3>
{bill_to}
<p>Email: {email}</p>
</div>
<div>
<h3>Invoice Details:</h3>
<p><strong>Invoice Number:</strong> INV-{number}</p>
<p><strong>Order Number:</strong> {number}</p>
<p><strong>Order Date:</strong> {ordered}</p>
<p><strong>Invoice Date:</strong> {issued}</p>
<p><strong>Payment Method:</strong> {method}</p>
<p><strong>Payment Status:</strong> {status:?}</p>
</div>
<table>
<thead><tr><th>Item</th><th>Quantity</th><th>Unit Price</th><th>Total</th></tr></thead>
<tbody>
{rows}
<tr class="total-row"><td colspan="3">Subtotal</td><td>₹{subtotal:.2}</td></tr>
<tr class="total-row"><td colspan="3">Tax &amp; Shipping</td><td>₹{charges:.2}</td></tr>
<tr class="total-row"><td colspan="3"><strong>Total Amount</strong></td><td><strong>₹{total:.2}</strong></td></tr>
</tbody>
</table>
<p>Thank you for your business!</p>
</body>
</html>
"#,
        number = html_escape(&o.order_number),
        bill_to = bill_to,
        email = html_escape(customer_email),
        ordered = o.created_at.format("%d/%m/%Y"),
        issued = issued.format("%d/%m/%Y"),
        method = payment_method_label(o.payment_method),
        status = o.payment_status,
        rows = rows,
        subtotal = subtotal,
        charges = charges,
        total = o.total_amount,
    )
}

/// Checkout and order lifecycle for customers; status changes for admins.
///
/// Creation, cancellation and admin cancellation each run in a single
/// transaction so stock and order rows never disagree.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    rules: PricingRules,
    return_window_days: i64,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        rules: PricingRules,
        return_window_days: i64,
    ) -> Self {
        Self {
            db,
            event_sender,
            rules,
            return_window_days,
        }
    }

    /// Places an order from explicit lines or from the caller's cart.
    ///
    /// Prices come from the current variant prices and the total is the cart
    /// summary total (subtotal, tax and shipping). The stock check, the order
    /// rows, the stock decrement and the cart removal commit together.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let delivery_address = address::Entity::find_by_id(request.address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address"))?;

        let lines: Vec<OrderLineInput> = match request.items {
            Some(items) => items,
            None => {
                let cart = cart::Entity::find()
                    .filter(cart::Column::UserId.eq(user_id))
                    .one(&txn)
                    .await?;
                match cart {
                    Some(cart) => cart_item::Entity::find()
                        .filter(cart_item::Column::CartId.eq(cart.id))
                        .order_by_asc(cart_item::Column::CreatedAt)
                        .all(&txn)
                        .await?
                        .into_iter()
                        .map(|line| OrderLineInput {
                            product_id: line.product_id,
                            variant_id: line.variant_id,
                            quantity: line.quantity,
                        })
                        .collect(),
                    None => Vec::new(),
                }
            }
        };
        if lines.is_empty() {
            return Err(ServiceError::BadRequest("No items to order".to_string()));
        }

        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            line.validate()?;
            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product"))?;
            let variant = product_variant::Entity::find_by_id(line.variant_id)
                .one(&txn)
                .await?
                .filter(|v| v.product_id == line.product_id)
                .ok_or_else(|| ServiceError::not_found("Product variant"))?;
            if variant.quantity < line.quantity {
                return Err(ServiceError::InsufficientStock {
                    message: format!("Insufficient stock for {}", product.name),
                    available: variant.quantity,
                });
            }
            priced.push((line.quantity, product, variant));
        }

        let summary = CartSummary::compute(
            &priced
                .iter()
                .map(|(qty, _, v)| (v.price, *qty))
                .collect::<Vec<_>>(),
            &self.rules,
        );

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = next_order_number(&txn, now).await?;
        order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            address_id: Set(delivery_address.id),
            total_amount: Set(summary.total),
            payment_method: Set(request.payment_method.unwrap_or(PaymentMethod::Cod)),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Processing),
            estimated_delivery: Set(Some(estimated_delivery(now))),
            payment_details: Set(None),
            cancellation_reason: Set(None),
            cancelled_at: Set(None),
            return_reason: Set(None),
            return_description: Set(None),
            return_requested_at: Set(None),
            return_status: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (quantity, product, variant) in &priced {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                variant_id: Set(variant.id),
                product_name: Set(product.name.clone()),
                size: Set(variant.size.clone()),
                color: Set(variant.color.clone()),
                quantity: Set(*quantity),
                price: Set(variant.price),
            }
            .insert(&txn)
            .await?;

            if !decrement_stock(&txn, variant.id, *quantity).await? {
                warn!(variant_id = %variant.id, "stock changed during checkout");
                return Err(ServiceError::InsufficientStock {
                    message: format!("Insufficient stock for {}", product.name),
                    available: 0,
                });
            }
        }

        delete_user_cart(&txn, user_id).await?;
        txn.commit().await?;

        info!(%order_id, %order_number, total = %summary.total, "order placed");
        self.event_sender.send_or_log(Event::OrderCreated {
            order_id,
            order_number,
            total_amount: summary.total,
        });

        self.load(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, user_id: Uuid, query: &OrderListQuery) -> Result<OrderList, ServiceError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);

        let mut filtered = order::Entity::find().filter(order::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            filtered = filtered.filter(order::Column::OrderStatus.eq(status));
        }
        let paginator = filtered
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = attach_items(&*self.db, paginator.fetch_page(page - 1).await?).await?;

        let all = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?;
        let summary = summarize_history(&all);

        Ok(OrderList {
            orders,
            pagination: OrderPagination {
                current_page: page,
                total_pages: (total + limit - 1) / limit,
                total_orders: total,
                has_more: page * limit < total,
            },
            summary,
        })
    }

    /// Returns the caller's order and its timeline; other users' orders are not found.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(OrderWithItems, Vec<TimelineEntry>), ServiceError> {
        let found = self.find_owned(user_id, order_id).await?;
        let timeline = build_timeline(&found);
        let mut with_items = attach_items(&*self.db, vec![found]).await?;
        let order = with_items
            .pop()
            .ok_or_else(|| ServiceError::not_found("Order"))?;
        Ok((order, timeline))
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let found = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order"))?;

        if !found.order_status.is_cancellable() {
            return Err(ServiceError::BadRequest(
                "Order cannot be cancelled in its current status".to_string(),
            ));
        }

        cancel_in_txn(&txn, found, reason.clone()).await?;
        txn.commit().await?;

        info!(%order_id, "order cancelled by customer");
        self.event_sender
            .send_or_log(Event::OrderCancelled { order_id, reason });
        self.load(order_id).await
    }

    #[instrument(skip(self, request))]
    pub async fn request_return(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        request: ReturnOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;
        let found = self.find_owned(user_id, order_id).await?;

        let now = Utc::now();
        check_return_eligibility(&found, now, self.return_window_days)?;

        let mut active: order::ActiveModel = found.into();
        active.return_reason = Set(Some(request.reason));
        active.return_description = Set(request.description);
        active.return_requested_at = Set(Some(now));
        active.return_status = Set(Some(ReturnStatus::Pending));
        active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::ReturnRequested {
            order_id,
            requested_at: now,
        });
        self.load(order_id).await
    }

    /// Returns `(order_number, html)` for the caller's order.
    #[instrument(skip(self))]
    pub async fn invoice(&self, user_id: Uuid, order_id: Uuid) -> Result<(String, String), ServiceError> {
        let (order, _) = self.get(user_id, order_id).await?;
        let customer = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let html = render_invoice(&order, &customer.email, Utc::now());
        Ok((order.order.order_number, html))
    }

    /// Admin status change. Moving to `Cancelled` restores stock; `Pending` is not a target.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderWithItems, ServiceError> {
        if status == OrderStatus::Pending {
            return Err(ServiceError::BadRequest("Invalid order status".to_string()));
        }

        let txn = self.db.begin().await?;
        let found = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order"))?;
        let old_status = found.order_status;

        if old_status == status {
            txn.commit().await?;
            return self.load(order_id).await;
        }
        if old_status == OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(
                "Cancelled orders cannot change status".to_string(),
            ));
        }

        if status == OrderStatus::Cancelled {
            cancel_in_txn(&txn, found, Some("Cancelled by admin".to_string())).await?;
        } else {
            let mut active: order::ActiveModel = found.into();
            active.order_status = Set(status);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }
        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderStatusChanged {
            order_id,
            old_status: old_status.as_str().to_string(),
            new_status: status.as_str().to_string(),
        });
        self.load(order_id).await
    }

    async fn find_owned(&self, user_id: Uuid, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order"))
    }

    pub async fn load(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order"))?;
        attach_items(&*self.db, vec![found])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Order"))
    }
}

/// Per-status counts and spend across all of a user's orders.
pub fn summarize_history(orders: &[order::Model]) -> OrderHistorySummary {
    let mut by_status: BTreeMap<&'static str, StatusTotals> = BTreeMap::new();
    for o in orders {
        let entry = by_status
            .entry(o.order_status.as_str())
            .or_insert_with(|| StatusTotals {
                status: o.order_status,
                count: 0,
                total_spent: Decimal::ZERO,
            });
        entry.count += 1;
        entry.total_spent += o.total_amount;
    }

    let orders_by_status: Vec<StatusTotals> = by_status.into_values().collect();
    let total_spent = orders_by_status.iter().map(|s| s.total_spent).sum();
    OrderHistorySummary {
        total_orders: orders.len() as u64,
        total_spent,
        orders_by_status,
    }
}
