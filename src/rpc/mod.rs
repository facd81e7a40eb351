//! RPC invocation boundary.
//!
//! # Data Flow
//! ```text
//! StructuredRequest (selector, input type, proto3 JSON message)
//!     → invoker.rs (RpcInvoker implementation)
//!     → response message as proto3 JSON, or RpcError
//!     → status.rs (canonical code → HTTP status)
//! ```
//!
//! # Design Decisions
//! - The gateway never speaks a wire protocol itself; encoding and transport
//!   belong to the invoker
//! - Errors carry canonical gRPC codes so the HTTP mapping is one table

pub mod invoker;
pub mod status;

pub use invoker::{EchoInvoker, RpcInvoker};
pub use status::{RpcCode, RpcError};
