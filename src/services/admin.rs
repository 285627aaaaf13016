//! Back-office reporting and user management.
//!
//! Aggregations are computed in Rust over the rows in range so the same
//! code runs on SQLite and Postgres.

use crate::{
    auth::{user, UserRole},
    db,
    entities::{
        order::{self, OrderStatus},
        order_item, payment,
        product::{self, ProductCategory},
        product_variant, review,
    },
    errors::ServiceError,
    services::{
        accounts::{delete_user_data, UserProfile},
        orders::{self, attach_items, payment_method_label, OrderWithItems},
    },
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    #[serde(default = "default_range_days", alias = "time_range")]
    pub time_range: i64,
}

fn default_range_days() -> i64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRoleRequest {
    #[serde(default, alias = "user_ids")]
    pub user_ids: Vec<Uuid>,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[serde(rename = "12months")]
    TwelveMonths,
}

impl Timeframe {
    pub fn days(&self) -> i64 {
        match self {
            Timeframe::SevenDays => 7,
            Timeframe::ThirtyDays => 30,
            Timeframe::TwelveMonths => 365,
        }
    }

    pub fn monthly(&self) -> bool {
        matches!(self, Timeframe::TwelveMonths)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_range_days")]
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesBucket {
    pub period: String,
    pub orders: u64,
    pub revenue: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInventory {
    pub category: ProductCategory,
    pub total_variants: u64,
    pub total_stock: i64,
    pub low_stock: u64,
    pub out_of_stock: u64,
    pub average_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub total_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountWithRevenue {
    pub key: String,
    pub count: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_users: u64,
    pub total_orders: u64,
    pub total_products: u64,
    pub total_revenue: Decimal,
    pub new_users: u64,
    pub active_users: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub metrics: DashboardMetrics,
    pub sales_analytics: Vec<SalesBucket>,
    pub inventory_status: Vec<CategoryInventory>,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<order::Model>,
    pub order_status: Vec<CountWithRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub user: UserProfile,
    pub orders: Vec<OrderWithItems>,
    pub reviews: Vec<review::Model>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAnalytics {
    pub timeframe: Timeframe,
    pub buckets: Vec<SalesBucket>,
    pub status_breakdown: Vec<CountWithRevenue>,
    pub payment_methods: Vec<CountWithRevenue>,
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub category: ProductCategory,
    pub variant_id: Uuid,
    pub size: String,
    pub color: String,
    pub price: Decimal,
    pub quantity: i32,
    pub low_stock: bool,
    pub out_of_stock: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTotals {
    pub variants: u64,
    pub total_stock: i64,
    pub low_stock: u64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub items: Vec<InventoryItem>,
    pub totals: InventoryTotals,
    pub by_category: Vec<CategoryInventory>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub days: i64,
    pub registrations: Vec<DailyCount>,
    pub new_users: u64,
    pub active_buyers: u64,
    pub verified_users: u64,
    pub unverified_users: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub latency_ms: Option<u128>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub database: DatabaseHealth,
    pub uptime_secs: u64,
    pub version: &'static str,
    pub environment: String,
}

pub fn parse_role(raw: &str) -> Result<UserRole, ServiceError> {
    UserRole::parse(raw).ok_or_else(|| ServiceError::BadRequest("Invalid role".to_string()))
}

/// Statuses an administrator may move an order to.
pub fn parse_admin_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    match raw {
        "Processing" => Ok(OrderStatus::Processing),
        "Shipped" => Ok(OrderStatus::Shipped),
        "Delivered" => Ok(OrderStatus::Delivered),
        "Cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(ServiceError::BadRequest("Invalid order status".to_string())),
    }
}

fn period_key(at: DateTime<Utc>, monthly: bool) -> String {
    if monthly {
        at.format("%Y-%m").to_string()
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

/// Orders grouped per day (or month), oldest period first.
pub fn bucket_orders(orders: &[order::Model], monthly: bool) -> Vec<SalesBucket> {
    let mut buckets: BTreeMap<String, (u64, Decimal)> = BTreeMap::new();
    for o in orders {
        let entry = buckets
            .entry(period_key(o.created_at, monthly))
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += o.total_amount;
    }
    buckets
        .into_iter()
        .map(|(period, (count, revenue))| SalesBucket {
            period,
            orders: count,
            revenue,
            average_order_value: average(revenue, count),
        })
        .collect()
}

fn count_by<F>(orders: &[order::Model], key: F) -> Vec<CountWithRevenue>
where
    F: Fn(&order::Model) -> String,
{
    let mut grouped: BTreeMap<String, (u64, Decimal)> = BTreeMap::new();
    for o in orders {
        let entry = grouped.entry(key(o)).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += o.total_amount;
    }
    grouped
        .into_iter()
        .map(|(key, (count, revenue))| CountWithRevenue { key, count, revenue })
        .collect()
}

pub fn status_breakdown(orders: &[order::Model]) -> Vec<CountWithRevenue> {
    count_by(orders, |o| o.order_status.as_str().to_string())
}

pub fn payment_method_breakdown(orders: &[order::Model]) -> Vec<CountWithRevenue> {
    count_by(orders, |o| payment_method_label(o.payment_method).to_string())
}

/// Per-category stock figures; a variant is low when below `low_threshold`.
pub fn inventory_by_category(
    products: &[product::Model],
    variants: &[product_variant::Model],
    low_threshold: i32,
) -> Vec<CategoryInventory> {
    let categories: HashMap<Uuid, ProductCategory> =
        products.iter().map(|p| (p.id, p.category)).collect();

    let mut grouped: BTreeMap<&'static str, (ProductCategory, CategoryInventory, Decimal)> =
        BTreeMap::new();
    for v in variants {
        let Some(category) = categories.get(&v.product_id).copied() else {
            continue;
        };
        let key = match category {
            ProductCategory::Men => "men",
            ProductCategory::Women => "women",
        };
        let (_, entry, price_sum) = grouped.entry(key).or_insert_with(|| {
            (
                category,
                CategoryInventory {
                    category,
                    total_variants: 0,
                    total_stock: 0,
                    low_stock: 0,
                    out_of_stock: 0,
                    average_price: Decimal::ZERO,
                },
                Decimal::ZERO,
            )
        });
        entry.total_variants += 1;
        entry.total_stock += i64::from(v.quantity);
        if v.quantity < low_threshold {
            entry.low_stock += 1;
        }
        if v.quantity == 0 {
            entry.out_of_stock += 1;
        }
        *price_sum += v.price;
    }

    grouped
        .into_values()
        .map(|(_, mut entry, price_sum)| {
            entry.average_price = average(price_sum, entry.total_variants);
            entry
        })
        .collect()
}

/// Best sellers by units, ties broken by revenue.
pub fn top_products(items: &[order_item::Model], limit: usize) -> Vec<TopProduct> {
    let mut grouped: HashMap<Uuid, TopProduct> = HashMap::new();
    for item in items {
        let entry = grouped.entry(item.product_id).or_insert_with(|| TopProduct {
            product_id: item.product_id,
            name: item.product_name.clone(),
            total_sold: 0,
            revenue: Decimal::ZERO,
        });
        entry.total_sold += i64::from(item.quantity);
        entry.revenue += item.line_total();
    }

    let mut ranked: Vec<TopProduct> = grouped.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_sold
            .cmp(&a.total_sold)
            .then(b.revenue.cmp(&a.revenue))
    });
    ranked.truncate(limit);
    ranked
}

#[derive(Clone)]
pub struct AdminService {
    db: Arc<DatabaseConnection>,
    orders: orders::OrderService,
    low_stock_threshold: i32,
    environment: String,
    started_at: Instant,
}

impl AdminService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        orders: orders::OrderService,
        low_stock_threshold: i32,
        environment: String,
    ) -> Self {
        Self {
            db,
            orders,
            low_stock_threshold,
            environment,
            started_at: Instant::now(),
        }
    }

    async fn orders_since(&self, since: DateTime<Utc>) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CreatedAt.gte(since))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, range_days: i64) -> Result<Dashboard, ServiceError> {
        let since = Utc::now() - Duration::days(range_days.clamp(1, 3650));
        let db = &*self.db;

        let total_users = user::Entity::find().count(db).await?;
        let total_orders = order::Entity::find().count(db).await?;
        let total_products = product::Entity::find().count(db).await?;
        let new_users = user::Entity::find()
            .filter(user::Column::CreatedAt.gte(since))
            .count(db)
            .await?;
        let active_users = user::Entity::find()
            .filter(user::Column::LastLoginAt.gte(since))
            .count(db)
            .await?;

        let all_orders = order::Entity::find().all(db).await?;
        let total_revenue = all_orders
            .iter()
            .filter(|o| o.order_status != OrderStatus::Cancelled)
            .map(|o| o.total_amount)
            .sum();

        let in_range = self.orders_since(since).await?;
        let range_ids: Vec<Uuid> = in_range
            .iter()
            .filter(|o| o.order_status != OrderStatus::Cancelled)
            .map(|o| o.id)
            .collect();
        let sold = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(range_ids))
            .all(db)
            .await?;

        let products = product::Entity::find().all(db).await?;
        let variants = product_variant::Entity::find().all(db).await?;

        let recent_orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, 10)
            .fetch_page(0)
            .await?;

        Ok(Dashboard {
            metrics: DashboardMetrics {
                total_users,
                total_orders,
                total_products,
                total_revenue,
                new_users,
                active_users,
            },
            sales_analytics: bucket_orders(&in_range, false),
            inventory_status: inventory_by_category(&products, &variants, self.low_stock_threshold),
            top_products: top_products(&sold, 5),
            recent_orders,
            order_status: status_breakdown(&all_orders),
        })
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        query: &UserListQuery,
    ) -> Result<(Vec<UserProfile>, u64), ServiceError> {
        let mut select = user::Entity::find().order_by_desc(user::Column::CreatedAt);
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(user::Column::Name.contains(search))
                    .add(user::Column::Email.contains(search)),
            );
        }
        if let Some(role) = query.role {
            select = select.filter(user::Column::Role.eq(role));
        }

        let paginator = select.paginate(&*self.db, query.limit.clamp(1, 100));
        let total = paginator.num_items().await?;
        let users = paginator
            .fetch_page(query.page.max(1) - 1)
            .await?
            .into_iter()
            .map(UserProfile::from)
            .collect();
        Ok((users, total))
    }

    pub async fn user_detail(&self, user_id: Uuid) -> Result<UserDetail, ServiceError> {
        let found = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let reviews = review::Entity::find()
            .filter(review::Column::UserId.eq(user_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(UserDetail {
            user: found.into(),
            orders: attach_items(&*self.db, orders).await?,
            reviews,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_role(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        role: &str,
    ) -> Result<UserProfile, ServiceError> {
        let role = parse_role(role)?;
        if admin_id == user_id {
            return Err(ServiceError::BadRequest(
                "You cannot change your own role".to_string(),
            ));
        }

        let found = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        let mut active: user::ActiveModel = found.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(%admin_id, %user_id, role = role.as_str(), "user role changed");
        Ok(updated.into())
    }

    /// Sets the role on every listed user except the caller; returns the rows changed.
    #[instrument(skip(self, request))]
    pub async fn bulk_update_roles(
        &self,
        admin_id: Uuid,
        request: BulkRoleRequest,
    ) -> Result<u64, ServiceError> {
        if request.user_ids.is_empty() {
            return Err(ServiceError::BadRequest(
                "User IDs array is required".to_string(),
            ));
        }
        let role = parse_role(&request.role)?;
        let ids: Vec<Uuid> = request
            .user_ids
            .into_iter()
            .filter(|id| *id != admin_id)
            .collect();

        let result = user::Entity::update_many()
            .col_expr(user::Column::Role, Expr::value(role.as_str()))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.is_in(ids))
            .exec(&*self.db)
            .await?;

        info!(%admin_id, count = result.rows_affected, role = role.as_str(), "bulk role update");
        Ok(result.rows_affected)
    }

    /// Deletes a user together with their orders and everything else they own.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, admin_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if admin_id == user_id {
            return Err(ServiceError::BadRequest(
                "You cannot delete your own account from the admin panel".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        user::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        orders::delete_for_user(&txn, user_id).await?;
        payment::Entity::delete_many()
            .filter(payment::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        delete_user_data(&txn, user_id).await?;
        user::Entity::delete_by_id(user_id).exec(&txn).await?;
        txn.commit().await?;

        warn!(%admin_id, %user_id, "user deleted by admin");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn order_analytics(&self, timeframe: Timeframe) -> Result<OrderAnalytics, ServiceError> {
        let since = Utc::now() - Duration::days(timeframe.days());
        let orders = self.orders_since(since).await?;

        let total_orders = orders.len() as u64;
        let total_revenue: Decimal = orders
            .iter()
            .filter(|o| o.order_status != OrderStatus::Cancelled)
            .map(|o| o.total_amount)
            .sum();

        Ok(OrderAnalytics {
            timeframe,
            buckets: bucket_orders(&orders, timeframe.monthly()),
            status_breakdown: status_breakdown(&orders),
            payment_methods: payment_method_breakdown(&orders),
            total_orders,
            total_revenue,
            average_order_value: average(total_revenue, total_orders),
        })
    }

    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        status: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let status = parse_admin_status(status)?;
        self.orders.set_status(order_id, status).await
    }

    #[instrument(skip(self))]
    pub async fn inventory(&self) -> Result<InventoryReport, ServiceError> {
        let products = product::Entity::find()
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;
        let variants = product_variant::Entity::find().all(&*self.db).await?;
        let by_id: HashMap<Uuid, &product::Model> = products.iter().map(|p| (p.id, p)).collect();

        let mut totals = InventoryTotals::default();
        let mut items = Vec::with_capacity(variants.len());
        for v in &variants {
            let Some(p) = by_id.get(&v.product_id) else {
                continue;
            };
            let low_stock = v.quantity < self.low_stock_threshold;
            let out_of_stock = v.quantity == 0;
            totals.variants += 1;
            totals.total_stock += i64::from(v.quantity);
            totals.low_stock += u64::from(low_stock);
            totals.out_of_stock += u64::from(out_of_stock);
            items.push(InventoryItem {
                product_id: p.id,
                product_name: p.name.clone(),
                category: p.category,
                variant_id: v.id,
                size: v.size.clone(),
                color: v.color.clone(),
                price: v.price,
                quantity: v.quantity,
                low_stock,
                out_of_stock,
            });
        }
        items.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.product_name.cmp(&b.product_name)));

        Ok(InventoryReport {
            by_category: inventory_by_category(&products, &variants, self.low_stock_threshold),
            items,
            totals,
        })
    }

    #[instrument(skip(self))]
    pub async fn user_activity(&self, days: i64) -> Result<UserActivity, ServiceError> {
        let days = days.clamp(1, 3650);
        let since = Utc::now() - Duration::days(days);

        let registered = user::Entity::find()
            .filter(user::Column::CreatedAt.gte(since))
            .all(&*self.db)
            .await?;
        let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
        for u in &registered {
            *per_day.entry(period_key(u.created_at, false)).or_default() += 1;
        }

        let mut buyers: Vec<Uuid> = self
            .orders_since(since)
            .await?
            .into_iter()
            .map(|o| o.user_id)
            .collect();
        buyers.sort();
        buyers.dedup();

        let verified_users = user::Entity::find()
            .filter(user::Column::IsVerified.eq(true))
            .count(&*self.db)
            .await?;
        let unverified_users = user::Entity::find()
            .filter(user::Column::IsVerified.eq(false))
            .count(&*self.db)
            .await?;

        Ok(UserActivity {
            days,
            new_users: registered.len() as u64,
            registrations: per_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            active_buyers: buyers.len() as u64,
            verified_users,
            unverified_users,
        })
    }

    pub async fn system_health(&self) -> SystemHealth {
        let database = match db::check_connection(&self.db).await {
            Ok(latency) => DatabaseHealth {
                status: "connected",
                latency_ms: Some(latency.as_millis()),
            },
            Err(err) => {
                warn!(error = %err, "database health check failed");
                DatabaseHealth {
                    status: "disconnected",
                    latency_ms: None,
                }
            }
        };

        SystemHealth {
            database,
            uptime_secs: self.started_at.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            environment: self.environment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::{PaymentMethod, PaymentStatus};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn order_at(day: u32, total: Decimal, status: OrderStatus, method: PaymentMethod) -> order::Model {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        order::Model {
            id: Uuid::new_v4(),
            order_number: format!("ORD2403{:04}", day),
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            total_amount: total,
            payment_method: method,
            payment_status: PaymentStatus::Pending,
            order_status: status,
            estimated_delivery: None,
            payment_details: None,
            cancellation_reason: None,
            cancelled_at: None,
            return_reason: None,
            return_description: None,
            return_requested_at: None,
            return_status: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn orders_are_bucketed_per_day_and_month() {
        let orders = vec![
            order_at(1, dec!(100), OrderStatus::Processing, PaymentMethod::Cod),
            order_at(1, dec!(50), OrderStatus::Delivered, PaymentMethod::Upi),
            order_at(2, dec!(30), OrderStatus::Processing, PaymentMethod::Cod),
        ];

        let daily = bucket_orders(&orders, false);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].period, "2024-03-01");
        assert_eq!(daily[0].orders, 2);
        assert_eq!(daily[0].revenue, dec!(150));
        assert_eq!(daily[0].average_order_value, dec!(75));

        let monthly = bucket_orders(&orders, true);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period, "2024-03");
        assert_eq!(monthly[0].orders, 3);
    }

    #[test]
    fn breakdowns_group_by_status_and_method() {
        let orders = vec![
            order_at(1, dec!(100), OrderStatus::Processing, PaymentMethod::Cod),
            order_at(2, dec!(40), OrderStatus::Processing, PaymentMethod::Upi),
            order_at(3, dec!(60), OrderStatus::Cancelled, PaymentMethod::Cod),
        ];
        let by_status = status_breakdown(&orders);
        let processing = by_status.iter().find(|s| s.key == "Processing").unwrap();
        assert_eq!(processing.count, 2);
        assert_eq!(processing.revenue, dec!(140));

        let by_method = payment_method_breakdown(&orders);
        assert_eq!(by_method.iter().map(|m| m.count).sum::<u64>(), 3);
    }

    #[test]
    fn inventory_flags_low_and_out_of_stock() {
        let now = Utc::now();
        let shirt = product::Model {
            id: Uuid::new_v4(),
            name: "Shirt".into(),
            description: "Cotton".into(),
            details: None,
            category: ProductCategory::Men,
            images: json!([]),
            created_at: now,
            updated_at: now,
        };
        let variant = |quantity: i32, price: Decimal| product_variant::Model {
            id: Uuid::new_v4(),
            product_id: shirt.id,
            size: "M".into(),
            color: "Blue".into(),
            price,
            quantity,
        };
        let variants = vec![variant(0, dec!(10)), variant(5, dec!(20)), variant(40, dec!(30))];

        let report = inventory_by_category(&[shirt.clone()], &variants, 10);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].total_variants, 3);
        assert_eq!(report[0].total_stock, 45);
        assert_eq!(report[0].low_stock, 2);
        assert_eq!(report[0].out_of_stock, 1);
        assert_eq!(report[0].average_price, dec!(20));
    }

    #[test]
    fn top_products_rank_by_units_sold() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let line = |product_id: Uuid, name: &str, quantity: i32| order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id,
            variant_id: Uuid::new_v4(),
            product_name: name.into(),
            size: "M".into(),
            color: "Red".into(),
            quantity,
            price: dec!(10),
        };
        let items = vec![line(a, "A", 1), line(b, "B", 2), line(a, "A", 3)];
        let top = top_products(&items, 5);
        assert_eq!(top[0].name, "A");
        assert_eq!(top[0].total_sold, 4);
        assert_eq!(top[0].revenue, dec!(40));
        assert_eq!(top_products(&items, 1).len(), 1);
    }

    #[test]
    fn role_parsing() {
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert!(parse_role("root").is_err());
    }

    #[rstest::rstest]
    #[case("Processing", Some(OrderStatus::Processing))]
    #[case("Shipped", Some(OrderStatus::Shipped))]
    #[case("Delivered", Some(OrderStatus::Delivered))]
    #[case("Cancelled", Some(OrderStatus::Cancelled))]
    #[case("Pending", None)]
    #[case("shipped", None)]
    fn admin_status_targets(#[case] raw: &str, #[case] expected: Option<OrderStatus>) {
        assert_eq!(parse_admin_status(raw).ok(), expected);
    }

    #[test]
    fn timeframe_parses_from_query_values() {
        let q: AnalyticsQuery = serde_json::from_value(json!({"timeframe": "12months"})).unwrap();
        assert!(q.timeframe.monthly());
        assert_eq!(q.timeframe.days(), 365);
        let q: AnalyticsQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q.timeframe, Timeframe::SevenDays);
    }
}
