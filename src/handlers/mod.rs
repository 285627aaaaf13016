pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod common;
pub mod currencies;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod search;
pub mod shipping;
pub mod users;
pub mod wishlist;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::Notifier,
    payments::PaymentGateway,
    services::{
        accounts::{AccountPolicy, AccountService},
        addresses::AddressService,
        admin::AdminService,
        cart::{CartService, PricingRules},
        currencies::CurrencyService,
        orders::OrderService,
        payments::PaymentService,
        products::ProductService,
        reviews::ReviewService,
        shipping::ShippingService,
        wishlist::WishlistService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub products: Arc<ProductService>,
    pub reviews: Arc<ReviewService>,
    pub cart: Arc<CartService>,
    pub wishlist: Arc<WishlistService>,
    pub addresses: Arc<AddressService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub shipping: Arc<ShippingService>,
    pub currencies: Arc<CurrencyService>,
    pub admin: Arc<AdminService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        notifier: Notifier,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let rules = PricingRules::from(config);
        let orders = OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            rules,
            config.return_window_days,
        );

        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                auth_service.clone(),
                notifier,
                event_sender.clone(),
                AccountPolicy::from(config),
            )),
            auth: auth_service,
            products: Arc::new(ProductService::new(db_pool.clone())),
            reviews: Arc::new(ReviewService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool.clone(), rules)),
            wishlist: Arc::new(WishlistService::new(db_pool.clone())),
            addresses: Arc::new(AddressService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(
                db_pool.clone(),
                event_sender,
                gateway,
                config.default_currency.clone(),
            )),
            shipping: Arc::new(ShippingService::new(db_pool.clone())),
            currencies: Arc::new(CurrencyService::new(db_pool.clone())),
            admin: Arc::new(AdminService::new(
                db_pool,
                orders.clone(),
                config.low_stock_threshold,
                config.environment.clone(),
            )),
            orders: Arc::new(orders),
        }
    }
}
