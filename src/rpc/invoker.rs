//! The seam between the gateway and RPC transport.

use std::future::Future;

use serde_json::Value;

use crate::rpc::status::RpcError;
use crate::transcoding::StructuredRequest;

/// Performs the RPC for an assembled request.
///
/// Implementations receive the request message in proto3 JSON form and
/// return the response message in the same form.
pub trait RpcInvoker: Send + Sync + 'static {
    fn invoke(
        &self,
        request: StructuredRequest,
    ) -> impl Future<Output = Result<Value, RpcError>> + Send;
}

/// Answers every call with the assembled request message.
///
/// Useful for checking rules: the response shows exactly what a backend
/// would have received.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoInvoker;

impl RpcInvoker for EchoInvoker {
    async fn invoke(&self, request: StructuredRequest) -> Result<Value, RpcError> {
        tracing::debug!(selector = %request.selector, "Echoing request");
        Ok(request.message)
    }
}
