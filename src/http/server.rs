//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the transcoding handler on every path
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind server to listener
//! - Swap in reloaded rule sets without dropping requests
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, Response, StatusCode},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::request::{propagate_request_id, request_id, set_request_id};
use crate::http::response::{self, ErrorBody};
use crate::observability::metrics;
use crate::rpc::{RpcCode, RpcInvoker};
use crate::transcoding::Transcoder;

/// Application state injected into handlers.
pub struct AppState<I> {
    pub transcoder: Arc<ArcSwap<Transcoder>>,
    pub invoker: Arc<I>,
    pub max_body_bytes: usize,
}

impl<I> Clone for AppState<I> {
    fn clone(&self) -> Self {
        Self {
            transcoder: self.transcoder.clone(),
            invoker: self.invoker.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    transcoder: Arc<ArcSwap<Transcoder>>,
}

impl HttpServer {
    /// Create a new HTTP server serving `transcoder` through `invoker`.
    pub fn new<I: RpcInvoker>(config: GatewayConfig, transcoder: Transcoder, invoker: I) -> Self {
        metrics::set_rules_loaded(transcoder.registry().len());
        let transcoder = Arc::new(ArcSwap::from_pointee(transcoder));

        let state = AppState {
            transcoder: transcoder.clone(),
            invoker: Arc::new(invoker),
            max_body_bytes: config.listener.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            transcoder,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<I: RpcInvoker>(config: &GatewayConfig, state: AppState<I>) -> Router {
        Router::new()
            .route("/{*path}", any(transcode_handler::<I>))
            .route("/", any(transcode_handler::<I>))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id())
            .layer(set_request_id())
            .layer(TraceLayer::new_for_http())
    }

    /// Handle to the active rule set.
    pub fn transcoder(&self) -> Arc<ArcSwap<Transcoder>> {
        self.transcoder.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Rule sets received on `transcoder_updates` replace the active one;
    /// requests already in flight finish on the set they started with.
    pub async fn run(
        self,
        listener: TcpListener,
        mut transcoder_updates: mpsc::UnboundedReceiver<Transcoder>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rules = self.transcoder.load().registry().len(),
            "HTTP server starting"
        );

        let active = self.transcoder.clone();
        tokio::spawn(async move {
            while let Some(next) = transcoder_updates.recv().await {
                let rules = next.registry().len();
                active.store(Arc::new(next));
                metrics::set_rules_loaded(rules);
                tracing::info!(rules, "Rule set reloaded");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Match, assemble, invoke, project.
async fn transcode_handler<I: RpcInvoker>(
    State(state): State<AppState<I>>,
    request: Request<Body>,
) -> Response<Body> {
    let start_time = Instant::now();
    let request_id = request_id(request.extensions())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let method = parts.method.as_str();
    let path = parts.uri.path();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Transcoding request"
    );

    let transcoder = state.transcoder.load_full();

    // 1. Match Route
    let route = match transcoder.route(method, path) {
        Ok(route) => route,
        Err(e) => {
            tracing::warn!(request_id = %request_id, method = %method, path = %path, "No rule matched");
            metrics::record_route_miss(method);
            metrics::record_request(method, e.status_code().as_u16(), "none", start_time);
            return response::transcode_error(&e);
        }
    };
    let selector = route.selector();

    // 2. Buffer Request Body
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            let status = StatusCode::PAYLOAD_TOO_LARGE;
            metrics::record_request(method, status.as_u16(), selector, start_time);
            return response::error_response(
                status,
                ErrorBody::new(RpcCode::InvalidArgument, format!("request body: {}", e)),
            );
        }
    };

    // 3. Assemble
    let structured = match transcoder.assemble(&route, parts.uri.query(), &body) {
        Ok(structured) => structured,
        Err(e) => {
            tracing::warn!(request_id = %request_id, selector = %selector, error = %e, "Request rejected");
            metrics::record_request(method, e.status_code().as_u16(), selector, start_time);
            return response::transcode_error(&e);
        }
    };

    // 4. Invoke
    match state.invoker.invoke(structured).await {
        Ok(message) => {
            metrics::record_request(method, StatusCode::OK.as_u16(), selector, start_time);
            response::json_response(transcoder.project(&route, &message))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, selector = %selector, error = %e, "RPC failed");
            metrics::record_request(method, e.http_status().as_u16(), selector, start_time);
            response::rpc_error(&e)
        }
    }
}
