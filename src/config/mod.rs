//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → Transcoder::from_config (rules compiled against descriptors)
//!     → shared via Arc<ArcSwap<Transcoder>> with request handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and compiles the new rule set
//!     → atomic swap of the Transcoder; failures keep the old one
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::HttpConfig;
pub use schema::HttpRuleConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
