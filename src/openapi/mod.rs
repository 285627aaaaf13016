use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopfront API",
        version = "0.1.0",
        description = r#"
# Shopfront API

Storefront backend covering catalog browsing, carts, checkout, payments, shipping zones and admin reporting.

## Authentication

Protected endpoints accept a JWT either as a bearer token or as the `token` session cookie set by the login endpoints:

```
Authorization: Bearer <your-jwt-token>
```

Guests can keep a cart through the `guest_cart` cookie and merge it after signing in.

## Rate Limiting

Requests are rate-limited per client. Limited responses carry:
- `X-RateLimit-Limit`: Maximum requests per window
- `X-RateLimit-Remaining`: Remaining requests in current window
- `X-RateLimit-Reset`: Seconds until the window resets

## Errors

Every failure uses the same body:

```json
{
  "success": false,
  "error": "Not Found",
  "message": "Product not found",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Health", description = "Liveness and status endpoints"),
        (name = "Products", description = "Catalog browsing and search"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Shipping", description = "Shipping quotes"),
        (name = "Currencies", description = "Currency conversion")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::search::search_products,
        crate::handlers::reviews::product_reviews,
        crate::handlers::shipping::calculate_shipping,
        crate::handlers::currencies::convert_amount,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::health::HealthResponse,
        crate::handlers::health::ComponentStatus,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
