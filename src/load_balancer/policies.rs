//! Remaining selection policies: random, first, ip_hash and header.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::ConnectInfo, http::request::Parts};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::load_balancer::{
    host::UpstreamHost, least_conn::LeastConnections, round_robin::RoundRobin, LoadBalancer,
};

/// Policy names accepted in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Random,
    RoundRobin,
    LeastConn,
    First,
    IpHash,
    Header,
}

impl PolicyKind {
    /// Instantiate the policy. `header` is only used by [`PolicyKind::Header`].
    pub fn build(self, header: Option<&str>) -> Box<dyn LoadBalancer> {
        match self {
            PolicyKind::Random => Box::new(Random),
            PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
            PolicyKind::LeastConn => Box::new(LeastConnections::new()),
            PolicyKind::First => Box::new(First),
            PolicyKind::IpHash => Box::new(IpHash),
            PolicyKind::Header => Box::new(HeaderHash {
                header: header.unwrap_or_default().to_string(),
            }),
        }
    }
}

/// Picks a random available host.
#[derive(Debug, Default)]
pub struct Random;

impl LoadBalancer for Random {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], _req: &Parts) -> Option<Arc<UpstreamHost>> {
        let available: Vec<_> = hosts.iter().filter(|h| h.available()).collect();
        available.choose(&mut rand::thread_rng()).map(|h| Arc::clone(h))
    }
}

/// Always the first available host in configuration order.
#[derive(Debug, Default)]
pub struct First;

impl LoadBalancer for First {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], _req: &Parts) -> Option<Arc<UpstreamHost>> {
        hosts.iter().find(|h| h.available()).cloned()
    }
}

/// Sticks each client IP to one host while it stays available.
#[derive(Debug, Default)]
pub struct IpHash;

impl LoadBalancer for IpHash {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], req: &Parts) -> Option<Arc<UpstreamHost>> {
        let ip = req
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();
        by_hash(hosts, &ip)
    }
}

/// Hashes the value of a request header; random when the header is absent.
#[derive(Debug)]
pub struct HeaderHash {
    header: String,
}

impl LoadBalancer for HeaderHash {
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], req: &Parts) -> Option<Arc<UpstreamHost>> {
        if self.header.is_empty() {
            return None;
        }
        match req.headers.get(self.header.as_str()).and_then(|v| v.to_str().ok()) {
            Some(value) if !value.is_empty() => by_hash(hosts, value),
            _ => Random.next_server(hosts, req),
        }
    }
}

/// Hash `key` onto the pool, probing forward past unavailable hosts.
fn by_hash(hosts: &[Arc<UpstreamHost>], key: &str) -> Option<Arc<UpstreamHost>> {
    if hosts.is_empty() {
        return None;
    }
    let len = hosts.len();
    let start = fnv1a(key.as_bytes()) as usize % len;
    (0..len)
        .map(|i| &hosts[start.wrapping_add(i) % len])
        .find(|h| h.available())
        .cloned()
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(0x0100_0193)
    })
}
