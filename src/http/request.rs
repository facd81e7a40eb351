//! Request ID handling.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Keep a caller-supplied `x-request-id` instead of replacing it
//! - Expose the ID to handlers and echo it on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The ID travels as a request extension so handlers never re-parse headers

use axum::http::{Extensions, HeaderName};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns a UUID to requests that arrive without an `x-request-id`.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies the request's `x-request-id` onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The ID recorded by [`set_request_id`], if it is printable.
pub fn request_id(extensions: &Extensions) -> Option<&str> {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, Response};
    use std::convert::Infallible;
    use tower::{service_fn, ServiceBuilder, ServiceExt};
    use uuid::Uuid;

    async fn echo_id(request: Request<()>) -> Result<Response<String>, Infallible> {
        let id = request_id(request.extensions()).unwrap_or_default().to_string();
        Ok(Response::new(id))
    }

    #[tokio::test]
    async fn test_generates_id() {
        let service = ServiceBuilder::new()
            .layer(set_request_id())
            .layer(propagate_request_id())
            .service(service_fn(echo_id));
        let response = service.oneshot(Request::new(())).await.unwrap();

        let header = response.headers().get(&X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(header).is_ok());
        assert_eq!(response.body(), header);
    }

    #[tokio::test]
    async fn test_keeps_caller_id() {
        let service = ServiceBuilder::new()
            .layer(set_request_id())
            .layer(propagate_request_id())
            .service(service_fn(echo_id));
        let request = Request::builder()
            .header("x-request-id", "abc-123")
            .body(())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(response.headers().get(&X_REQUEST_ID).unwrap(), "abc-123");
        assert_eq!(response.body(), "abc-123");
    }
}
