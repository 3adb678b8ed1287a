//! Static upstream group.
//!
//! # Responsibilities
//! - Hold the hosts routed on one path prefix
//! - Apply the group's policy to select a host
//! - Answer ignored sub-path and retry budget queries
//!
//! The host set lives behind an `ArcSwap` so health tooling can replace
//! it while requests keep reading the previous snapshot.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::request::Parts;
use url::Url;

use crate::config::{TransportConfig, UpstreamConfig};
use crate::http::transport::{HttpClient, HttpForwarder};
use crate::load_balancer::{host::UpstreamHost, LoadBalancer, Upstream};
use crate::routing::matcher::path_matches;

/// Upstream group built from configuration.
#[derive(Debug)]
pub struct StaticUpstream {
    from: String,
    hosts: ArcSwap<Vec<Arc<UpstreamHost>>>,
    policy: Box<dyn LoadBalancer>,
    ignored_sub_paths: Vec<String>,
    try_duration: Duration,
    try_interval: Duration,
    max_body_size: Option<u64>,
}

impl StaticUpstream {
    pub fn new(from: impl Into<String>, policy: Box<dyn LoadBalancer>) -> Self {
        Self {
            from: from.into(),
            hosts: ArcSwap::from_pointee(Vec::new()),
            policy,
            ignored_sub_paths: Vec::new(),
            try_duration: Duration::ZERO,
            try_interval: Duration::from_millis(250),
            max_body_size: None,
        }
    }

    pub fn with_hosts(self, hosts: Vec<Arc<UpstreamHost>>) -> Self {
        self.hosts.store(Arc::new(hosts));
        self
    }

    pub fn with_try(mut self, duration: Duration, interval: Duration) -> Self {
        self.try_duration = duration;
        self.try_interval = interval;
        self
    }

    pub fn with_max_body_size(mut self, limit: Option<u64>) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn with_ignored_sub_paths(mut self, paths: Vec<String>) -> Self {
        self.ignored_sub_paths = paths;
        self
    }

    /// Build a group and its hosts, binding an HTTP forwarder to every host
    /// whose name parses as a URL.
    pub fn from_config(
        config: &UpstreamConfig,
        transport: &TransportConfig,
        client: &HttpClient,
    ) -> Self {
        let upstream_headers =
            (!config.header_upstream.is_empty()).then(|| Arc::new(config.header_upstream.clone()));
        let downstream_headers = (!config.header_downstream.is_empty())
            .then(|| Arc::new(config.header_downstream.clone()));

        let hosts = config
            .to
            .iter()
            .map(|to| {
                let name = if to.contains("://") {
                    to.clone()
                } else {
                    format!("http://{to}")
                };
                let mut host = UpstreamHost::new(name)
                    .with_max_conns(config.max_conns)
                    .with_fail_timeout(Duration::from_millis(config.fail_timeout_ms));
                host.without_path_prefix = config.without.clone();
                host.upstream_headers = upstream_headers.clone();
                host.downstream_headers = downstream_headers.clone();

                match Url::parse(&host.name) {
                    Ok(target) => {
                        let forwarder = HttpForwarder::new(client.clone(), target)
                            .without_path_prefix(config.without.clone())
                            .max_body_size(transport.max_body_size)
                            .response_timeout(transport.response_timeout());
                        host.with_forwarder(Arc::new(forwarder))
                    }
                    Err(e) => {
                        tracing::warn!(host = %host.name, error = %e, "Upstream host is not a valid URL");
                        host
                    }
                }
            })
            .map(Arc::new)
            .collect();

        Self::new(config.from.clone(), config.policy.build(config.policy_header.as_deref()))
            .with_hosts(hosts)
            .with_try(
                Duration::from_millis(config.try_duration_ms),
                Duration::from_millis(config.try_interval_ms),
            )
            .with_ignored_sub_paths(config.except.clone())
            .with_max_body_size(transport.max_body_size)
    }

    /// Snapshot of the current host set.
    pub fn hosts(&self) -> Arc<Vec<Arc<UpstreamHost>>> {
        self.hosts.load_full()
    }

    /// Replace the host set.
    pub fn set_hosts(&self, hosts: Vec<Arc<UpstreamHost>>) {
        self.hosts.store(Arc::new(hosts));
    }
}

impl Upstream for StaticUpstream {
    fn path_prefix(&self) -> &str {
        &self.from
    }

    fn select(&self, req: &Parts) -> Option<Arc<UpstreamHost>> {
        let pool = self.hosts.load();
        if pool.len() == 1 {
            return pool.first().filter(|h| h.available()).cloned();
        }
        if !pool.iter().any(|h| h.available()) {
            tracing::debug!(upstream = %self.from, host_count = pool.len(), "All upstream hosts are down");
            return None;
        }
        self.policy.next_server(&pool, req)
    }

    fn allowed_path(&self, path: &str) -> bool {
        !self.ignored_sub_paths.iter().any(|ignored| {
            let full = format!(
                "{}/{}",
                self.from.trim_end_matches('/'),
                ignored.trim_start_matches('/')
            );
            path_matches(path, &full)
        })
    }

    fn try_duration(&self) -> Duration {
        self.try_duration
    }

    fn try_interval(&self) -> Duration {
        self.try_interval
    }

    fn max_body_size(&self) -> Option<u64> {
        self.max_body_size
    }
}
