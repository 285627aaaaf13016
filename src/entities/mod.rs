pub mod address;
pub mod cart;
pub mod cart_item;
pub mod currency;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod product_variant;
pub mod review;
pub mod shipping_zone;
pub mod wishlist;
pub mod wishlist_item;
