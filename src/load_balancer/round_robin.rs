//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::request::Parts;

use crate::load_balancer::{host::UpstreamHost, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], _req: &Parts) -> Option<Arc<UpstreamHost>> {
        if hosts.is_empty() {
            return None;
        }

        // Skip unavailable hosts, but give up after one full lap
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = hosts.len();

        (0..len)
            .map(|i| &hosts[start.wrapping_add(i) % len])
            .find(|host| host.available())
            .cloned()
    }
}
