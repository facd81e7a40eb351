//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Detect duplicate messages, methods and fields
//! - Check field type declarations
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Rule templates and field references are checked when the rule set is
//!   compiled, not here

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted location of the offending value.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut messages = HashSet::new();
    for message in &config.messages {
        if !messages.insert(message.name.as_str()) {
            errors.push(ValidationError::new(
                format!("messages.{}", message.name),
                "declared more than once",
            ));
        }
        let mut fields = HashSet::new();
        for field in &message.fields {
            let location = format!("messages.{}.{}", message.name, field.name);
            if !fields.insert(field.name.as_str()) {
                errors.push(ValidationError::new(location.clone(), "declared more than once"));
            }
            if let Err(reason) = field.kind() {
                errors.push(ValidationError::new(location, reason));
            }
        }
    }

    let mut selectors = HashSet::new();
    for method in &config.methods {
        if !selectors.insert(method.selector.as_str()) {
            errors.push(ValidationError::new(
                format!("methods.{}", method.selector),
                "declared more than once",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
