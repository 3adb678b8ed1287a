//! Reverse proxy forwarding engine.
//!
//! Matches a request to the most specific upstream group, selects an
//! available host, rewrites the request, forwards it and retries across the
//! group's hosts within a time budget.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, TransportError};
pub use http::{HttpServer, Proxy};
pub use lifecycle::Shutdown;
pub use load_balancer::{StaticUpstream, Upstream, UpstreamHost};
