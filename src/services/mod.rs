// Catalog
pub mod products;
pub mod reviews;

// Shopping
pub mod cart;
pub mod wishlist;

// Checkout
pub mod addresses;
pub mod orders;
pub mod payments;
pub mod shipping;

// Accounts and back office
pub mod accounts;
pub mod admin;

// Reference data
pub mod currencies;
