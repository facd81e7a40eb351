//! Transcoding error definitions.
//!
//! Load-time errors (template, rule and schema problems) abort startup or a
//! reload. Request-time errors are reported to the offending caller only.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while compiling rules or transcoding a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    /// The template violates the path template grammar.
    #[error("malformed path template `{template}` at byte {position}: {reason}")]
    MalformedTemplate {
        template: String,
        position: usize,
        reason: String,
    },

    /// A variable's subtemplate declares another variable.
    #[error("nested variable in path template `{template}` at byte {position}")]
    NestedVariable { template: String, position: usize },

    /// `**` appears twice or is followed by another path segment.
    #[error("`**` must be the last segment of path template `{template}`")]
    MisplacedDoubleWildcard { template: String },

    /// The rule itself is structurally invalid.
    #[error("invalid http rule for `{selector}`: {reason}")]
    InvalidRule { selector: String, reason: String },

    /// A rule names a method with no descriptor.
    #[error("no method descriptor for selector `{0}`")]
    UnknownSelector(String),

    /// A message type is referenced but never declared.
    #[error("unknown message type `{0}`")]
    UnknownMessage(String),

    /// No binding matched the request.
    #[error("no route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A field path segment does not name a field.
    #[error("message `{message}` has no field `{field}`")]
    UnknownField { message: String, field: String },

    /// A field path resolves to a field that cannot be bound this way.
    #[error("field `{field_path}` cannot be bound: {reason}")]
    InvalidFieldType { field_path: String, reason: String },

    /// A query parameter targets a field that query strings cannot express.
    #[error("query parameter `{key}` cannot be mapped: {reason}")]
    UnsupportedQueryMapping { key: String, reason: String },

    /// A captured or query value does not parse as the field's type.
    #[error("value `{value}` is not a valid {expected} for field `{field_path}`")]
    TypeCoercion {
        field_path: String,
        expected: String,
        value: String,
    },

    /// The request body is not usable JSON for the binding.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// A decoded path segment is not valid UTF-8.
    #[error("path segment `{0}` does not decode to UTF-8")]
    InvalidPercentEncoding(String),
}

/// Result type for transcoding operations.
pub type TranscodeResult<T> = Result<T, TranscodeError>;

impl TranscodeError {
    /// True for errors that can only arise while building a registry.
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            TranscodeError::MalformedTemplate { .. }
                | TranscodeError::NestedVariable { .. }
                | TranscodeError::MisplacedDoubleWildcard { .. }
                | TranscodeError::InvalidRule { .. }
                | TranscodeError::UnknownSelector(_)
                | TranscodeError::UnknownMessage(_)
        )
    }

    /// HTTP status reported to the caller for a request-time error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TranscodeError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_load_time() => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub(crate) fn malformed(template: &str, position: usize, reason: impl Into<String>) -> Self {
        TranscodeError::MalformedTemplate {
            template: template.to_string(),
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_rule(selector: &str, reason: impl Into<String>) -> Self {
        TranscodeError::InvalidRule {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}
