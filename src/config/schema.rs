//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are plain integers with the unit in the field name.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::headers::HeaderRules;
use crate::load_balancer::policies::PolicyKind;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Settings shared by every upstream transport.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upstream groups, in routing tie-break order.
    pub upstreams: Vec<UpstreamConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Overall request timeout in seconds (0 disables it).
    pub request_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 0,
        }
    }
}

/// Upstream transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in milliseconds (0 disables it).
    pub connect_timeout_ms: u64,

    /// Time to wait for response headers in milliseconds (0 disables it).
    pub response_timeout_ms: u64,

    /// Largest request body forwarded upstream; larger bodies get 413.
    pub max_body_size: Option<u64>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            response_timeout_ms: 0,
            max_body_size: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One upstream group.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Path prefix this group is routed on.
    #[serde(default = "default_from")]
    pub from: String,

    /// Host names; `http://` is assumed when no scheme is given.
    pub to: Vec<String>,

    /// Host selection policy.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Header hashed by the `header` policy.
    #[serde(default)]
    pub policy_header: Option<String>,

    /// How long to keep trying hosts after failures, in milliseconds.
    #[serde(default)]
    pub try_duration_ms: u64,

    /// Wait between attempts, in milliseconds.
    #[serde(default = "default_try_interval_ms")]
    pub try_interval_ms: u64,

    /// How long a failure marks a host down, in milliseconds (0 = never).
    #[serde(default)]
    pub fail_timeout_ms: u64,

    /// Maximum concurrent connections per host (0 = unlimited).
    #[serde(default)]
    pub max_conns: i64,

    /// Prefix stripped from the path before forwarding.
    #[serde(default)]
    pub without: String,

    /// Sub-paths of `from` that this group does not handle.
    #[serde(default)]
    pub except: Vec<String>,

    /// Rules applied to requests going upstream.
    #[serde(default)]
    pub header_upstream: HeaderRules,

    /// Rules applied to responses coming back downstream.
    #[serde(default)]
    pub header_downstream: HeaderRules,
}

fn default_from() -> String {
    "/".to_string()
}

fn default_try_interval_ms() -> u64 {
    250
}
