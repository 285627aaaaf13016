mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn one_review_per_user_and_product() {
    let app = TestApp::new().await;
    let first = app.customer().await;
    let second = app.customer().await;
    let mug = app.seed_product("Enamel Mug", dec!(12.00), 20).await;
    let product_id = mug.product.id;

    let response = app
        .request(
            Method::POST,
            "/api/v1/reviews",
            Some(json!({ "productId": product_id, "rating": 4, "title": "Solid" })),
            Some(&first.token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::POST,
            "/api/v1/reviews",
            Some(json!({ "productId": product_id, "rating": 5, "title": "Even better" })),
            Some(&first.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["review"]["rating"], 5);

    let response = app
        .request(
            Method::POST,
            "/api/v1/reviews",
            Some(json!({ "productId": product_id, "rating": 2 })),
            Some(&second.token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/reviews/product/{product_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["totalReviews"], 2);
    assert_eq!(body["averageRating"], 3.5);
    assert_eq!(body["ratingDistribution"]["5"], 1);
    assert_eq!(body["ratingDistribution"]["2"], 1);
    assert_eq!(body["ratingDistribution"]["3"], 0);
}

#[tokio::test]
async fn ratings_outside_one_to_five_are_rejected() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let mug = app.seed_product("Tin Mug", dec!(9.00), 5).await;

    for rating in [0, 6] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/reviews",
                Some(json!({ "productId": mug.product.id, "rating": rating })),
                Some(&shopper.token),
            )
            .await;
        assert_eq!(response.status(), 400, "rating {rating}");
    }
}

#[tokio::test]
async fn only_the_author_or_an_admin_can_delete() {
    let app = TestApp::new().await;
    let author = app.customer().await;
    let stranger = app.customer().await;
    let admin = app.admin().await;
    let mug = app.seed_product("Stone Mug", dec!(14.00), 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/reviews",
            Some(json!({ "productId": mug.product.id, "rating": 3 })),
            Some(&author.token),
        )
        .await;
    let body = response_json(response).await;
    let review_id = body["review"]["id"].as_str().expect("review id").to_string();
    let uri = format!("/api/v1/reviews/{review_id}");

    let response = app
        .request(Method::DELETE, &uri, None, Some(&stranger.token))
        .await;
    assert_eq!(response.status(), 403);

    // hidden reviews drop out of the public listing
    let response = app
        .request(
            Method::PATCH,
            &format!("{uri}/status"),
            Some(json!({ "status": "rejected" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/reviews/product/{}", mug.product.id),
            None,
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["totalReviews"], 0);

    let response = app.request(Method::DELETE, &uri, None, Some(&admin.token)).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn wishlist_holds_each_product_once() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let lamp = app.seed_product("Desk Lamp", dec!(30.00), 2).await;

    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                "/api/v1/wishlist",
                Some(json!({ "productId": lamp.product.id })),
                Some(&shopper.token),
            )
            .await;
        assert!(response.status().is_success());
    }

    let response = app
        .request(Method::GET, "/api/v1/wishlist", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["wishlist"]["products"].as_array().map(Vec::len), Some(1));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/wishlist/{}", lamp.product.id),
            None,
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);
}
