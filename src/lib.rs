//! HTTP/JSON to RPC transcoding gateway library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::server ──▶ transcoding::Transcoder ──▶ rpc::RpcInvoker
//!                      (axum + tower)    route / assemble            (proto3 JSON)
//!                                                                         │
//!     Client Response                                                     │
//!     ◀─────────────── http::response ◀── transcoding::response ◀─────────┘
//!                                          (response_body projection)
//!
//!     Cross-cutting: config (TOML, validation, hot reload), observability
//!     (tracing, metrics), lifecycle (startup, signals, shutdown)
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rpc;
pub mod transcoding;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rpc::{EchoInvoker, RpcInvoker};
pub use transcoding::{TranscodeError, Transcoder};
