//! Guest and member carts through checkout, cancellation and invoicing.

mod common;

use axum::http::Method;
use common::{address_body, cookie_pair, decimal, response_json, response_text, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use sea_orm::EntityTrait;
use shopfront_api::entities::product_variant;
use uuid::Uuid;

async fn variant_stock(app: &TestApp, variant_id: Uuid) -> i32 {
    product_variant::Entity::find_by_id(variant_id)
        .one(&*app.state.db)
        .await
        .expect("variant query")
        .expect("variant exists")
        .quantity
}

#[tokio::test]
async fn guest_cart_is_tracked_by_cookie_and_merged_on_sign_in() {
    let app = TestApp::new().await;
    let tee = app.seed_product("Linen Tee", dec!(20.00), 5).await;
    let variant = &tee.variants[0];

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({
                "product_id": tee.product.id,
                "variant_id": variant.id,
                "quantity": 2,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let guest_cookie = cookie_pair(&response, "guest_cart").expect("guest cart cookie");
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(decimal(&body["summary"]["subtotal"]), dec!(40));
    // below the free-shipping threshold: 40 + 10% tax + 5 shipping
    assert_eq!(decimal(&body["summary"]["total"]), dec!(49));

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/cart",
            None,
            None,
            &[("cookie", guest_cookie.as_str())],
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"][0]["quantity"], 2);

    // no cookie, no cart
    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

    let shopper = app.customer().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({
                "product_id": tee.product.id,
                "variant_id": variant.id,
                "quantity": 2,
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/cart/merge-guest-cart",
            None,
            Some(&shopper.token),
            &[("cookie", guest_cookie.as_str())],
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(cookie_pair(&response, "guest_cart").as_deref(), Some("guest_cart="));
    let body = response_json(response).await;
    // both carts held 2 and stock is 5, so nothing is capped
    assert_eq!(body["items"][0]["quantity"], 4);

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/cart",
            None,
            None,
            &[("cookie", guest_cookie.as_str())],
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn adding_more_than_stock_reports_what_is_available() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let tee = app.seed_product("Scarce Tee", dec!(15.00), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({
                "product_id": tee.product.id,
                "variant_id": tee.variants[0].id,
                "quantity": 4,
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["availableQuantity"], 3);
}

#[tokio::test]
async fn zero_quantity_fails_validation() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let tee = app.seed_product("Any Tee", dec!(15.00), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({
                "product_id": tee.product.id,
                "variant_id": tee.variants[0].id,
                "quantity": 0,
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn checkout_from_cart_then_cancel_restores_stock() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let address_id = app.create_address(&shopper.token).await;
    let jacket = app.seed_product("Rain Jacket", dec!(60.00), 4).await;
    let variant_id = jacket.variants[0].id;

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "product_id": jacket.product.id, "variant_id": variant_id, "quantity": 2 })),
        Some(&shopper.token),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "addressId": address_id, "paymentMethod": "COD" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order = &body["order"];
    let order_id = order["id"].as_str().expect("order id").to_string();
    assert!(order["order_number"].as_str().unwrap_or_default().starts_with("ORD"));
    assert_eq!(order["order_status"], "Processing");
    assert_eq!(order["payment_status"], "Pending");
    // 120 subtotal is above the threshold: 120 + 12 tax, free shipping
    assert_eq!(decimal(&order["total_amount"]), dec!(132));
    assert_eq!(decimal(&order["items"][0]["price"]), dec!(60));

    assert_eq!(variant_stock(&app, variant_id).await, 2);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&shopper.token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(!body["timeline"].as_array().expect("timeline").is_empty());

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}/invoice"),
            None,
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"invoice-ORD"));
    let html = response_text(response).await;
    assert!(html.contains("Rain Jacket"));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(json!({ "reason": "Changed my mind" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["order"]["order_status"], "Cancelled");
    assert_eq!(variant_stock(&app, variant_id).await, 4);

    // a cancelled order stays cancelled
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn orders_are_private_to_their_owner() {
    let app = TestApp::new().await;
    let owner = app.customer().await;
    let other = app.customer().await;
    let address_id = app.create_address(&owner.token).await;
    let cap = app.seed_product("Cap", dec!(10.00), 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "addressId": address_id,
                "items": [{ "productId": cap.product.id, "variantId": cap.variants[0].id, "quantity": 1 }],
            })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order_id = body["order"]["id"].as_str().expect("order id").to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&other.token),
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&owner.token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["pagination"]["totalOrders"], 1);
    assert_eq!(body["summary"]["totalOrders"], 1);
}

#[tokio::test]
async fn checkout_with_an_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let address_id = app.create_address(&shopper.token).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "addressId": address_id })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "No items to order");
}

#[tokio::test]
async fn a_new_default_address_replaces_the_old_one() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let first = app.create_address(&shopper.token).await;

    let mut work = address_body();
    work["label"] = json!("Work");
    work["addressLine1"] = json!("5 Residency Road");
    let response = app
        .request(Method::POST, "/api/v1/addresses", Some(work), Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 201);
    let second = response_json(response).await["id"].clone();

    let response = app
        .request(Method::GET, "/api/v1/addresses", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let listed = body.as_array().expect("address list");
    assert_eq!(listed.len(), 2);
    let defaults: Vec<_> = listed.iter().filter(|a| a["is_default"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], second);
    assert!(listed.iter().any(|a| a["id"] == json!(first) && a["is_default"] == false));
}

#[tokio::test]
async fn a_failed_checkout_leaves_every_line_untouched() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let address_id = app.create_address(&shopper.token).await;
    let socks = app.seed_product("Wool Socks", dec!(8.00), 10).await;
    let boots = app.seed_product("Trail Boots", dec!(90.00), 3).await;
    let socks_variant = socks.variants[0].id;
    let boots_variant = boots.variants[0].id;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "addressId": address_id,
                "items": [
                    { "productId": socks.product.id, "variantId": socks_variant, "quantity": 2 },
                    { "productId": boots.product.id, "variantId": boots_variant, "quantity": 4 },
                ],
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["availableQuantity"], 3);

    // each line fits alone, together they oversell; the first decrement is undone
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "addressId": address_id,
                "items": [
                    { "productId": boots.product.id, "variantId": boots_variant, "quantity": 2 },
                    { "productId": boots.product.id, "variantId": boots_variant, "quantity": 2 },
                ],
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);

    assert_eq!(variant_stock(&app, socks_variant).await, 10);
    assert_eq!(variant_stock(&app, boots_variant).await, 3);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&shopper.token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["pagination"]["totalOrders"], 0);
}
