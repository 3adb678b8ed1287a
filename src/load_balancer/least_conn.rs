//! Least Connections load balancing strategy.

use std::sync::Arc;

use axum::http::request::Parts;

use crate::load_balancer::{host::UpstreamHost, LoadBalancer};

/// Least connections selector.
/// Selects the available host with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], _req: &Parts) -> Option<Arc<UpstreamHost>> {
        // In case of tie, the first one is selected (stability)
        hosts
            .iter()
            .filter(|h| h.available())
            .min_by_key(|h| h.conns())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let req = Request::builder().body(()).unwrap().into_parts().0;
        let h1 = Arc::new(UpstreamHost::new("http://127.0.0.1:8080"));
        let h2 = Arc::new(UpstreamHost::new("http://127.0.0.1:8081"));

        let _g1 = h1.connect();
        let hosts = vec![h1.clone(), h2.clone()];

        // Should pick h2 (0 connections)
        assert_eq!(lb.next_server(&hosts, &req).unwrap().name, h2.name);

        let _g2 = h2.connect();
        let _g3 = h2.connect();

        // Should pick h1 (1 connection)
        assert_eq!(lb.next_server(&hosts, &req).unwrap().name, h1.name);

        // Down hosts are ignored even when idle
        h1.set_unhealthy(true);
        assert_eq!(lb.next_server(&hosts, &req).unwrap().name, h2.name);
    }
}
