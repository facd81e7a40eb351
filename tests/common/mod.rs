//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use grpc_transcoder::config::loader::parse_config;
use grpc_transcoder::config::GatewayConfig;
use grpc_transcoder::http::HttpServer;
use grpc_transcoder::lifecycle::Shutdown;
use grpc_transcoder::rpc::{RpcError, RpcInvoker};
use grpc_transcoder::transcoding::{StructuredRequest, Transcoder};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Message and method declarations shared by every test rule set.
pub const DESCRIPTORS: &str = r#"
[[messages]]
name = "example.v1.GetMessageRequest"
fields = [
    { name = "name", type = "string" },
    { name = "message_id", type = "string" },
    { name = "user_id", type = "string" },
    { name = "revision", type = "int64" },
    { name = "sub", type = "message", type_name = "example.v1.SubMessage" },
    { name = "tags", type = "string", label = "repeated" },
]

[[messages]]
name = "example.v1.SubMessage"
fields = [
    { name = "subfield", type = "string" },
    { name = "a", type = "string", label = "repeated" },
]

[[messages]]
name = "example.v1.UpdateMessageRequest"
fields = [
    { name = "message_id", type = "string" },
    { name = "message", type = "message", type_name = "example.v1.Message" },
]

[[messages]]
name = "example.v1.Message"
fields = [
    { name = "message_id", type = "string" },
    { name = "text", type = "string" },
    { name = "views", type = "uint32" },
]

[[messages]]
name = "example.v1.ListMessagesResponse"
fields = [
    { name = "messages", type = "message", type_name = "example.v1.Message", label = "repeated" },
    { name = "next_page_token", type = "string" },
]

[[messages]]
name = "example.v1.GetFileRequest"
fields = [{ name = "path", type = "string" }]

[[methods]]
selector = "example.v1.Messaging.GetMessage"
input_type = "example.v1.GetMessageRequest"
output_type = "example.v1.Message"

[[methods]]
selector = "example.v1.Messaging.GetByName"
input_type = "example.v1.GetMessageRequest"
output_type = "example.v1.Message"

[[methods]]
selector = "example.v1.Messaging.UpdateMessage"
input_type = "example.v1.UpdateMessageRequest"
output_type = "example.v1.Message"

[[methods]]
selector = "example.v1.Messaging.CreateMessage"
input_type = "example.v1.Message"
output_type = "example.v1.Message"

[[methods]]
selector = "example.v1.Messaging.ListMessages"
input_type = "example.v1.GetMessageRequest"
output_type = "example.v1.ListMessagesResponse"

[[methods]]
selector = "example.v1.Files.GetFile"
input_type = "example.v1.GetFileRequest"
output_type = "example.v1.GetFileRequest"
"#;

/// The rule set served by the gateway tests.
pub const GATEWAY_RULES: &str = r#"
[[http.rules]]
selector = "example.v1.Messaging.GetMessage"
get = "/v1/messages/{message_id}"

[[http.rules.additional_bindings]]
get = "/v1/users/{user_id}/messages/{message_id}"

[[http.rules]]
selector = "example.v1.Messaging.UpdateMessage"
patch = "/v1/messages/{message_id}"
body = "message"

[[http.rules]]
selector = "example.v1.Messaging.CreateMessage"
post = "/v1/messages"
body = "*"

[[http.rules]]
selector = "example.v1.Messaging.ListMessages"
get = "/v1/messages"
response_body = "messages"

[[http.rules]]
selector = "example.v1.Files.GetFile"
get = "/v1/files/{path=**}"
"#;

/// Parse `rules` together with the shared descriptors.
pub fn config(rules: &str) -> GatewayConfig {
    let text = format!("{}\n{}", rules, DESCRIPTORS);
    parse_config(&text).unwrap()
}

/// Compile `rules` together with the shared descriptors.
pub fn transcoder(rules: &str) -> Transcoder {
    Transcoder::from_config(&config(rules)).unwrap()
}

/// Invoker that answers every call with the same message.
pub struct StaticInvoker(pub Value);

impl RpcInvoker for StaticInvoker {
    async fn invoke(&self, _request: StructuredRequest) -> Result<Value, RpcError> {
        Ok(self.0.clone())
    }
}

/// Invoker that fails every call.
pub struct FailingInvoker(pub RpcError);

impl RpcInvoker for FailingInvoker {
    async fn invoke(&self, _request: StructuredRequest) -> Result<Value, RpcError> {
        Err(self.0.clone())
    }
}

/// A running gateway on an ephemeral port.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<Transcoder>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the gateway with the shared rule set.
pub async fn start_gateway<I: RpcInvoker>(invoker: I) -> Gateway {
    let config = config(GATEWAY_RULES);
    let transcoder = Transcoder::from_config(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, transcoder_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, transcoder, invoker);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, transcoder_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        shutdown,
        updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
