mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn admin_routes_reject_customers() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;

    let response = app
        .request(Method::GET, "/api/v1/admin/dashboard", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request(Method::GET, "/api/v1/admin/dashboard", None, None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn dashboard_counts_users_orders_and_revenue() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let shopper = app.customer().await;
    let address_id = app.create_address(&shopper.token).await;
    let boots = app.seed_product("Trail Boots", dec!(80.00), 6).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "addressId": address_id,
                "items": [{ "productId": boots.product.id, "variantId": boots.variants[0].id, "quantity": 1 }],
            })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::GET,
            "/api/v1/admin/dashboard?timeRange=7",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let metrics = &body["data"]["metrics"];
    assert_eq!(metrics["totalUsers"], 2);
    assert_eq!(metrics["totalOrders"], 1);
    assert_eq!(metrics["totalProducts"], 1);
    // 80 + 8 tax, shipping waived above 50
    assert_eq!(decimal(&metrics["totalRevenue"]), dec!(88));
    assert_eq!(body["data"]["topProducts"][0]["name"], "Trail Boots");

    let response = app
        .request(
            Method::GET,
            "/api/v1/admin/orders/analytics?timeframe=30days",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["totalOrders"], 1);

    let response = app
        .request(
            Method::GET,
            "/api/v1/admin/orders/analytics?timeframe=fortnight",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn admin_can_move_orders_through_fulfilment() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let shopper = app.customer().await;
    let address_id = app.create_address(&shopper.token).await;
    let scarf = app.seed_product("Wool Scarf", dec!(25.00), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "addressId": address_id,
                "items": [{ "productId": scarf.product.id, "variantId": scarf.variants[0].id, "quantity": 2 }],
            })),
            Some(&shopper.token),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["order"]["id"].as_str().expect("order id").to_string();
    let status_uri = format!("/api/v1/admin/orders/{order_id}/status");

    let response = app
        .request(
            Method::PUT,
            &status_uri,
            Some(json!({ "status": "Pending" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::PUT,
            &status_uri,
            Some(json!({ "status": "Shipped" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["order"]["order_status"], "Shipped");

    // shipped orders are out of the customer's hands
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::PUT,
            &status_uri,
            Some(json!({ "status": "Cancelled" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", scarf.product.id),
            None,
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["product"]["variants"][0]["quantity"], 3);
}

#[tokio::test]
async fn role_changes_and_deletion_exclude_the_caller() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let shopper = app.customer().await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/users/{}/role", shopper.user.id),
            Some(json!({ "role": "admin" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["user"]["role"], "admin");

    // the role is read from the store, so the promotion applies to the existing token
    let response = app
        .request(Method::GET, "/api/v1/admin/inventory", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/users/{}/role", shopper.user.id),
            Some(json!({ "role": "superuser" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::PUT,
            "/api/v1/admin/users/bulk-role",
            Some(json!({ "userIds": [admin.user.id, shopper.user.id], "role": "user" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["modifiedCount"], 1);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", admin.user.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", shopper.user.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/admin/users/{}", shopper.user.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn deleting_a_customer_returns_held_stock_and_keeps_numbering() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let first = app.customer().await;
    let second = app.customer().await;
    let first_address = app.create_address(&first.token).await;
    let second_address = app.create_address(&second.token).await;
    let mitts = app.seed_product("Oven Mitts", dec!(12.00), 5).await;

    let order = |address_id: String, quantity: i32| {
        json!({
            "addressId": address_id,
            "items": [{ "productId": mitts.product.id, "variantId": mitts.variants[0].id, "quantity": quantity }],
        })
    };

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order(first_address.to_string(), 2)), Some(&first.token))
        .await;
    assert_eq!(response.status(), 201);
    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order(second_address.to_string(), 1)), Some(&second.token))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let second_number = body["order"]["order_number"].as_str().expect("order number").to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", first.user.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);

    // the deleted customer's two processing units are back on the shelf
    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}", mitts.product.id), None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["product"]["variants"][0]["quantity"], 4);

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order(second_address.to_string(), 1)), Some(&second.token))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let next_number = body["order"]["order_number"].as_str().expect("order number").to_string();
    assert!(next_number > second_number, "{next_number} after {second_number}");
}
