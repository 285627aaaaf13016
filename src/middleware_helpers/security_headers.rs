use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-permitted-cross-domain-policies", "none"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
    ),
];

/// Adds the standard browser hardening headers to every response.
///
/// HSTS is only emitted when `hsts` is set, which the router does in production.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    apply(next.run(req).await, false)
}

/// Same as [`security_headers_middleware`] plus `strict-transport-security`.
pub async fn security_headers_with_hsts_middleware(req: Request, next: Next) -> Response {
    apply(next.run(req).await, true)
}

fn apply(mut res: Response, hsts: bool) -> Response {
    let headers = res.headers_mut();

    for (name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    if hsts {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    // Invoices and other attachments set their own caching policy.
    if !headers.contains_key("cache-control") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store"),
        );
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "ok"
    }

    async fn send(app: Router) -> Response {
        app.oneshot(
            axum::http::Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn security_headers_are_set() {
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(axum::middleware::from_fn(security_headers_middleware));

        let response = send(app).await;
        let headers = response.headers();

        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
        assert!(headers.get("strict-transport-security").is_none());
    }

    #[tokio::test]
    async fn hsts_variant_adds_transport_security() {
        let app = Router::new().route("/", get(test_handler)).layer(
            axum::middleware::from_fn(security_headers_with_hsts_middleware),
        );

        let response = send(app).await;
        assert!(response
            .headers()
            .contains_key("strict-transport-security"));
    }
}
