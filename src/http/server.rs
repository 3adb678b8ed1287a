//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router hosting the proxy as its fallback
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener and shut down gracefully
//! - Translate forwarding errors into client responses

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::http::forward::{NotFound, Proxy};
use crate::http::transport::build_client;
use crate::load_balancer::{StaticUpstream, Upstream};
use crate::observability::metrics;

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build upstream groups from configuration and wrap them in a server.
    pub fn new(config: ProxyConfig) -> Self {
        let client = build_client(config.transport.connect_timeout());
        let upstreams: Vec<Arc<dyn Upstream>> = config
            .upstreams
            .iter()
            .map(|u| {
                Arc::new(StaticUpstream::from_config(u, &config.transport, &client))
                    as Arc<dyn Upstream>
            })
            .collect();

        tracing::info!(upstreams = upstreams.len(), "Upstream groups configured");

        let proxy = Arc::new(Proxy::new(upstreams, Arc::new(NotFound)));
        Self::with_proxy(&config, proxy)
    }

    /// Host an already assembled proxy.
    pub fn with_proxy(config: &ProxyConfig, proxy: Arc<Proxy>) -> Self {
        Self {
            router: Self::build_router(config, proxy),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, proxy: Arc<Proxy>) -> Router {
        let router = Router::new().fallback(proxy_handler).with_state(proxy);
        let layers = ServiceBuilder::new().layer(TraceLayer::new_for_http());

        match config.listener.request_timeout() {
            Some(timeout) => router.layer(layers.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ))),
            None => router.layer(layers),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback handler: every request goes through the proxy.
async fn proxy_handler(State(proxy): State<Arc<Proxy>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!("proxy", request_id = %request_id, method = %method, path = %path);

    let response = match proxy.serve(request).instrument(span).await {
        Ok(response) => response,
        Err(err) => {
            let status = err.status();
            if status == StatusCode::BAD_GATEWAY {
                tracing::error!(request_id = %request_id, path = %path, error = %err, "Upstream unavailable");
            } else {
                tracing::warn!(request_id = %request_id, path = %path, error = %err, status = %status, "Proxy error");
            }
            err.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
