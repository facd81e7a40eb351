//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway:
//! the listener, observability, the HTTP rule set and the message and method
//! descriptors the rules are checked against.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::transcoding::schema::{
    Cardinality, DescriptorPool, FieldDescriptor, FieldKind, MessageSchema, MethodDescriptor,
    ScalarType,
};
use crate::transcoding::{TranscodeError, TranscodeResult};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Transcoding rules.
    pub http: HttpConfig,

    /// Message descriptors.
    pub messages: Vec<MessageConfig>,

    /// Method descriptors keyed by selector.
    pub methods: Vec<MethodConfig>,
}

impl GatewayConfig {
    /// Build the descriptor pool declared by `messages` and `methods`.
    pub fn descriptor_pool(&self) -> TranscodeResult<DescriptorPool> {
        let messages = self
            .messages
            .iter()
            .map(MessageConfig::to_schema)
            .collect::<TranscodeResult<Vec<_>>>()?;
        let methods = self
            .methods
            .iter()
            .map(|m| MethodDescriptor {
                selector: m.selector.clone(),
                input_type: m.input_type.clone(),
                output_type: m.output_type.clone(),
            })
            .collect();
        DescriptorPool::new(messages, methods)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (transcoding plus RPC invocation) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// HTTP configuration: the transcoding rule set.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpConfig {
    /// Rules in registration order. For duplicate selectors the last one wins.
    pub rules: Vec<HttpRuleConfig>,

    /// Fully decode multi-segment captures that span several segments.
    pub fully_decode_reserved_expansion: bool,
}

/// One HTTP rule as written in the config file.
///
/// Exactly one of `get`, `put`, `post`, `delete`, `patch` and `custom` must be
/// set. Entries under `additional_bindings` must not have their own.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HttpRuleConfig {
    pub selector: String,
    pub get: Option<String>,
    pub put: Option<String>,
    pub post: Option<String>,
    pub delete: Option<String>,
    pub patch: Option<String>,
    pub custom: Option<CustomPatternConfig>,
    pub body: Option<String>,
    pub response_body: Option<String>,
    pub additional_bindings: Vec<HttpRuleConfig>,
}

/// A pattern for a method outside the standard five, or `*` for any.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomPatternConfig {
    pub kind: String,
    pub path: String,
}

/// A message type declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageConfig {
    /// Fully-qualified name, e.g. `example.v1.Message`.
    pub name: String,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl MessageConfig {
    fn to_schema(&self) -> TranscodeResult<MessageSchema> {
        let fields = self
            .fields
            .iter()
            .map(|f| f.to_descriptor(&self.name))
            .collect::<TranscodeResult<Vec<_>>>()?;
        Ok(MessageSchema::new(self.name.clone(), fields))
    }
}

/// A field declaration.
///
/// `type` is a scalar name (`string`, `int64`, ...) or `message` / `enum`
/// together with `type_name`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub type_name: Option<String>,

    #[serde(default)]
    pub label: Cardinality,
}

impl FieldConfig {
    /// Check the type declaration; the error text is used by validation.
    pub fn kind(&self) -> Result<FieldKind, String> {
        let type_name = || {
            self.type_name
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| format!("`{}` fields need a type_name", self.field_type))
        };
        match self.field_type.as_str() {
            "message" => type_name().map(FieldKind::Message),
            "enum" => type_name().map(FieldKind::Enum),
            scalar => scalar.parse::<ScalarType>().map(FieldKind::Scalar),
        }
    }

    fn to_descriptor(&self, message: &str) -> TranscodeResult<FieldDescriptor> {
        let kind = self.kind().map_err(|reason| TranscodeError::InvalidFieldType {
            field_path: format!("{}.{}", message, self.name),
            reason,
        })?;
        Ok(FieldDescriptor::new(self.name.clone(), kind).with_cardinality(self.label))
    }
}

/// Input and output message of one RPC method.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MethodConfig {
    pub selector: String,
    pub input_type: String,
    pub output_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:9000"

        [http]
        fully_decode_reserved_expansion = true

        [[http.rules]]
        selector = "example.v1.Messaging.GetMessage"
        get = "/v1/messages/{message_id}"

        [[http.rules.additional_bindings]]
        get = "/v1/users/{user_id}/messages/{message_id}"

        [[http.rules]]
        selector = "example.v1.Messaging.Watch"
        custom = { kind = "*", path = "/v1/watch/**" }

        [[messages]]
        name = "example.v1.GetMessageRequest"
        fields = [
            { name = "message_id", type = "string" },
            { name = "user_id", type = "string" },
            { name = "tags", type = "string", label = "repeated" },
            { name = "message", type = "message", type_name = "example.v1.Message" },
        ]

        [[messages]]
        name = "example.v1.Message"
        fields = [{ name = "text", type = "string" }]

        [[methods]]
        selector = "example.v1.Messaging.GetMessage"
        input_type = "example.v1.GetMessageRequest"
        output_type = "example.v1.Message"
    "#;

    #[test]
    fn test_parse_sample() {
        let config: GatewayConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.listener.max_body_bytes, 2 * 1024 * 1024);
        assert!(config.http.fully_decode_reserved_expansion);
        assert_eq!(config.http.rules.len(), 2);
        assert_eq!(config.http.rules[0].additional_bindings.len(), 1);
        assert_eq!(config.http.rules[1].custom.as_ref().unwrap().kind, "*");
        assert_eq!(config.messages[0].fields[2].label, Cardinality::Repeated);
    }

    #[test]
    fn test_descriptor_pool() {
        let config: GatewayConfig = toml::from_str(SAMPLE).unwrap();
        let pool = config.descriptor_pool().unwrap();
        assert_eq!(pool.message_count(), 2);
        let method = pool.method("example.v1.Messaging.GetMessage").unwrap();
        assert_eq!(method.output_type, "example.v1.Message");
    }

    #[test]
    fn test_field_kind() {
        let field = FieldConfig {
            name: "m".into(),
            field_type: "message".into(),
            type_name: None,
            label: Cardinality::Singular,
        };
        assert!(field.kind().is_err());

        let field = FieldConfig {
            field_type: "uint64".into(),
            ..field
        };
        assert_eq!(field.kind().unwrap(), FieldKind::Scalar(ScalarType::Uint64));
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.http.rules.is_empty());
    }
}
