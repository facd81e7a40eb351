//! HTTP/JSON ↔ RPC transcoding engine.
//!
//! # Data Flow
//! ```text
//! (method, path, query, body)
//!     → registry.rs (rules in registration order)
//!     → matcher.rs (template walk, percent decoding via percent.rs)
//!     → assembler.rs (path / body / query → request message, schema.rs lookups)
//!     → [RPC invoker]
//!     → response.rs (response_body projection)
//!
//! Compilation (at startup or reload):
//!     HttpConfig + message/method descriptors
//!     → template.rs (parse every pattern)
//!     → rule.rs (pattern oneof, body spec, one-level additional bindings)
//!     → registry.rs (resolve and validate every field reference)
//!     → Transcoder (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Everything that depends only on the rule set and schemas is checked at
//!   build time; a bad rule fails the build instead of a request
//! - Matching and assembly never block and never touch shared mutable state

pub mod assembler;
pub mod error;
pub mod matcher;
pub mod percent;
pub mod registry;
pub mod response;
pub mod rule;
pub mod schema;
pub mod template;

pub use assembler::{FieldClassification, RequestAssembler, StructuredRequest};
pub use error::{TranscodeError, TranscodeResult};
pub use matcher::{MatchOptions, VariableBinding};
pub use registry::{RouteMatch, RuleRegistry};
pub use response::ResponseProjector;
pub use rule::{Binding, BodySpec, HttpRule, Pattern};
pub use schema::DescriptorPool;
pub use template::{FieldPath, PathTemplate};

use bytes::Bytes;
use serde_json::Value;

use crate::config::GatewayConfig;

/// A compiled rule set together with the schemas it was validated against.
#[derive(Debug, Clone)]
pub struct Transcoder {
    pool: DescriptorPool,
    registry: RuleRegistry,
}

impl Transcoder {
    /// Build from a full gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> TranscodeResult<Self> {
        let pool = config.descriptor_pool()?;
        let registry = RuleRegistry::build(&config.http, &pool)?;
        Ok(Self::new(pool, registry))
    }

    pub fn new(pool: DescriptorPool, registry: RuleRegistry) -> Self {
        Self { pool, registry }
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Find the binding serving `method` and `path`.
    pub fn route(&self, method: &str, path: &str) -> TranscodeResult<RouteMatch<'_>> {
        self.registry.route(method, path)
    }

    /// Build the RPC request for a match.
    pub fn assemble(
        &self,
        route: &RouteMatch<'_>,
        raw_query: Option<&str>,
        raw_body: &[u8],
    ) -> TranscodeResult<StructuredRequest> {
        RequestAssembler::new(&self.pool).assemble(route, raw_query, raw_body)
    }

    /// Build the HTTP response body for the matched binding.
    pub fn project(&self, route: &RouteMatch<'_>, response: &Value) -> Bytes {
        ResponseProjector::new(&self.pool).project_route(route, response)
    }

    /// Field classification of a rule's binding.
    pub fn classify(&self, selector: &str, binding_index: usize) -> TranscodeResult<FieldClassification> {
        let rule = self
            .registry
            .get(selector)
            .ok_or_else(|| TranscodeError::UnknownSelector(selector.to_string()))?;
        let binding = rule.bindings().get(binding_index).ok_or_else(|| {
            TranscodeError::invalid_rule(selector, format!("no binding #{}", binding_index))
        })?;
        FieldClassification::classify(binding, &rule.method().input_type, &self.pool)
    }
}
