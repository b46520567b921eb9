//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the JSON API and the node RPC proxy
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve on a bound listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ExplorerConfig;
use crate::proxy::api;
use crate::proxy::node::NodeProxy;
use crate::proxy::request_id::UuidRequestId;
use crate::resilience::Deadline;
use crate::retrieval::upstream::parse_base;
use crate::retrieval::RetrievalOrchestrator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub node: NodeProxy,
}

/// HTTP server for the explorer API and node proxy.
pub struct ExplorerServer {
    router: Router,
}

impl ExplorerServer {
    pub fn new(config: &ExplorerConfig, orchestrator: Arc<RetrievalOrchestrator>) -> Result<Self, String> {
        let upstream = parse_base(&config.upstreams.node_rpc_upstream)?;
        let state = AppState {
            orchestrator,
            node: NodeProxy::new(upstream, Deadline::from_secs(config.retrieval.timeout_secs)),
        };
        let router = Self::build_router(Duration::from_secs(config.server.request_timeout_secs), state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/health", get(api::health))
            .route("/api/transactions/{hash}", get(api::transaction))
            .route("/api/accounts/{address}/transactions", get(api::address_history))
            .route("/rpc/{*path}", get(api::node_rpc))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// The router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
