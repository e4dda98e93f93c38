//! HTTP server implementation.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{limited, liveness, readiness};
use super::state::AppState;
use crate::error::Result;

/// Build the router serving health probes and the rate limited API.
pub fn build_router(api_prefix: &str, state: AppState) -> Router {
    let limited_path = format!("{}/limited", api_prefix.trim_end_matches('/'));

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route(&limited_path, get(limited))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// HTTP server for the admission control API.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Prefix of the rate limited routes
    api_prefix: String,
    /// State shared by every handler
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, api_prefix: impl Into<String>, state: AppState) -> Self {
        Self {
            addr,
            api_prefix: api_prefix.into(),
            state,
        }
    }

    /// The router this server will serve.
    pub fn router(&self) -> Router {
        build_router(&self.api_prefix, self.state.clone())
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        info!(
            addr = %self.addr,
            api_prefix = %self.api_prefix,
            "Starting HTTP server with graceful shutdown"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::config::FailurePolicy;
    use crate::http::ApiKeys;
    use crate::ratelimit::{AdmissionPolicy, LimiterConfig};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            AdmissionPolicy::new(store.clone(), LimiterConfig::per_secs(60, 60).unwrap()),
            store,
            Arc::new(MemoryAuditLog::new()),
            ApiKeys::new(["key"]),
            FailurePolicy::FailClosed,
        );

        let server = HttpServer::new(addr, "/api/v1/", state);
        let _router = server.router();
    }
}
