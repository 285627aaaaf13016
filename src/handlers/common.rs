use crate::errors::{ApiError, ServiceError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// `{success: true, message}`
pub fn message_response(message: impl Into<String>) -> Response {
    success_response(json!({ "success": true, "message": message.into() }))
}

/// `{success: true, <key>: data}`, the envelope used by the storefront endpoints.
pub fn keyed_response<T: Serialize>(key: &str, data: T) -> Result<Response, ApiError> {
    Ok(success_response(keyed(key, data)?))
}

pub fn keyed<T: Serialize>(key: &str, data: T) -> Result<Value, ApiError> {
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(
        key.to_string(),
        serde_json::to_value(data).map_err(ServiceError::from)?,
    );
    Ok(Value::Object(body))
}

/// `{status: "success", data}`, the envelope used by shipping and currencies.
pub fn data_response<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "status": "success", "data": data }))).into_response()
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Appends a `Set-Cookie` header; an unencodable value is skipped.
pub fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(value) = cookie {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Pagination block used by admin listings
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let pages = if total == 0 || limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn pagination_rounds_pages_up() {
        let meta = PaginationMeta::new(2, 10, 21);
        assert_eq!(meta.pages, 3);
        assert_eq!(PaginationMeta::new(1, 10, 0).pages, 0);
    }

    #[tokio::test]
    async fn keyed_response_wraps_data() {
        let response = keyed_response("wishlist", vec![1, 2]).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "success": true, "wishlist": [1, 2] }));
    }

    #[test]
    fn with_cookie_appends_set_cookie() {
        let response = with_cookie(
            message_response("ok"),
            Some(HeaderValue::from_static("token=abc; Path=/")),
        );
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            "token=abc; Path=/"
        );
    }
}
