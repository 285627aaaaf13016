//! Extractor wrappers that turn axum rejections into the normalized error body.

use crate::errors::ApiError;
use axum::{
    async_trait,
    extract::{
        path::ErrorKind,
        rejection::{PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Json, Path, Query, Request,
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// JSON body extractor whose rejection is a 400 `Invalid input data.` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::ValidationError(format!(
                "Invalid input data. {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Path extractor reporting `Invalid {param}: {value}` for malformed segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(path_rejection_to_error(rejection)),
        }
    }
}

fn path_rejection_to_error(rejection: PathRejection) -> ApiError {
    let message = match rejection {
        PathRejection::FailedToDeserializePathParams(inner) => match inner.into_kind() {
            ErrorKind::ParseErrorAtKey { key, value, .. } => format!("Invalid {}: {}", key, value),
            ErrorKind::ParseError { value, .. } | ErrorKind::ParseErrorAtIndex { value, .. } => {
                format!("Invalid id: {}", value)
            }
            other => format!("Invalid path parameter: {}", other),
        },
        other => other.body_text(),
    };
    ApiError::BadRequest {
        message,
        error_code: Some("INVALID_PATH".to_string()),
    }
}

/// Query-string extractor with the same 400 body as [`AppJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection_to_error(rejection)),
        }
    }
}

fn query_rejection_to_error(rejection: QueryRejection) -> ApiError {
    ApiError::ValidationError(format!("Invalid input data. {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Payload {
        quantity: i32,
    }

    async fn by_id(AppPath(id): AppPath<Uuid>) -> String {
        id.to_string()
    }

    async fn by_pair(AppPath((product_id, variant_id)): AppPath<(Uuid, Uuid)>) -> String {
        format!("{product_id}/{variant_id}")
    }

    async fn echo(AppJson(payload): AppJson<Payload>) -> String {
        payload.quantity.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/items/:id", get(by_id))
            .route("/pairs/:product_id/:variant_id", get(by_pair))
            .route("/echo", post(echo))
    }

    async fn message(response: axum::response::Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn malformed_uuid_names_the_parameter() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/items/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(message(response).await.starts_with("Invalid "));
    }

    #[tokio::test]
    async fn tuple_paths_extract_both_segments() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri(format!("/pairs/{a}/{b}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_json_is_a_normalized_400() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"quantity":"many"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(message(response).await.starts_with("Invalid input data."));
    }
}
