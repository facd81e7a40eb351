//! Response construction.
//!
//! # Responsibilities
//! - Wrap projected response bytes as a JSON HTTP response
//! - Render transcoding and RPC failures as error documents
//!
//! # Design Decisions
//! - Error bodies use the `{"code", "message", "details"}` status shape with
//!   the canonical numeric code, so clients see one format for every failure
//! - The HTTP status comes from the same code table as RPC failures, except
//!   for transcoding errors which carry their own status

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::rpc::{RpcCode, RpcError};
use crate::transcoding::TranscodeError;

/// JSON error document.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    pub details: Vec<Value>,
}

impl ErrorBody {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// A successful response carrying projected JSON.
pub fn json_response(body: Bytes) -> Response<Body> {
    with_json(StatusCode::OK, body)
}

/// Error response for a transcoding failure.
pub fn transcode_error(err: &TranscodeError) -> Response<Body> {
    error_response(err.status_code(), ErrorBody::new(RpcCode::from(err), err.to_string()))
}

/// Error response for a failed invocation.
pub fn rpc_error(err: &RpcError) -> Response<Body> {
    error_response(err.http_status(), ErrorBody::new(err.code, err.message.clone()))
}

/// Error response with an explicit status.
pub fn error_response(status: StatusCode, body: ErrorBody) -> Response<Body> {
    let bytes = serde_json::to_vec(&body).map(Bytes::from).unwrap_or_else(|_| {
        Bytes::from_static(br#"{"code":13,"message":"error serialization failed","details":[]}"#)
    });
    with_json(status, bytes)
}

fn with_json(status: StatusCode, body: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
