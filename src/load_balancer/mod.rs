//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → Upstream (group) identified
//!     → pool.rs (snapshot of the group's hosts)
//!     → Apply load balancing policy:
//!         - round_robin.rs (rotate through hosts)
//!         - least_conn.rs (pick host with fewest connections)
//!         - policies.rs (random, first, ip_hash, header)
//!     → host.rs (availability, connection and failure counters)
//!     → Return host or None
//! ```
//!
//! # Design Decisions
//! - Policies are stateless apart from their own cursor; hosts track counters
//! - Policy selection per group
//! - Unavailable hosts (down or full) are never returned

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;

pub mod host;
pub mod least_conn;
pub mod policies;
pub mod pool;
pub mod round_robin;

pub use host::{ConnectionGuard, UpstreamHost};
pub use pool::StaticUpstream;

/// A host selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick an available host from `hosts`, or `None` if there is none.
    fn next_server(&self, hosts: &[Arc<UpstreamHost>], req: &Parts) -> Option<Arc<UpstreamHost>>;
}

/// A group of upstream hosts routed on a path prefix.
pub trait Upstream: Send + Sync {
    /// The path this group is routed on.
    fn path_prefix(&self) -> &str;

    /// Select a host for the request, or `None` if no host is available.
    fn select(&self, req: &Parts) -> Option<Arc<UpstreamHost>>;

    /// False for sub-paths this group ignores.
    fn allowed_path(&self, path: &str) -> bool;

    /// How long to keep selecting hosts when attempts fail.
    fn try_duration(&self) -> Duration;

    /// How long to wait between attempts.
    fn try_interval(&self) -> Duration;

    /// Largest request body accepted for this group, if limited.
    fn max_body_size(&self) -> Option<u64> {
        None
    }
}
