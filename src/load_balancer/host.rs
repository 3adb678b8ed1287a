//! Upstream host abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track active connections and recent failures with atomics
//! - Decide availability (`!down && !full`)

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::http::headers::HeaderRules;
use crate::http::transport::Forwarder;

/// Custom replacement for the default down check.
pub type CheckDownFn = Arc<dyn Fn(&UpstreamHost) -> bool + Send + Sync>;

/// A single proxy upstream.
pub struct UpstreamHost {
    /// Backend name, usually a URL such as `http://10.0.0.1:8080`.
    pub name: String,
    /// Maximum concurrent connections (0 = unlimited).
    pub max_conns: i64,
    /// How long a failure counts against this host (zero disables counting).
    pub fail_timeout: Duration,
    /// Prefix removed from request paths before forwarding.
    pub without_path_prefix: String,
    pub upstream_headers: Option<Arc<HeaderRules>>,
    pub downstream_headers: Option<Arc<HeaderRules>>,
    pub check_down: Option<CheckDownFn>,
    pub forwarder: Option<Arc<dyn Forwarder>>,

    conns: AtomicI64,
    fails: AtomicI32,
    unhealthy: AtomicBool,
}

impl fmt::Debug for UpstreamHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamHost")
            .field("name", &self.name)
            .field("conns", &self.conns())
            .field("max_conns", &self.max_conns)
            .field("fails", &self.fails())
            .field("unhealthy", &self.is_unhealthy())
            .finish()
    }
}

impl UpstreamHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_conns: 0,
            fail_timeout: Duration::ZERO,
            without_path_prefix: String::new(),
            upstream_headers: None,
            downstream_headers: None,
            check_down: None,
            forwarder: None,
            conns: AtomicI64::new(0),
            fails: AtomicI32::new(0),
            unhealthy: AtomicBool::new(false),
        }
    }

    pub fn with_max_conns(mut self, max_conns: i64) -> Self {
        self.max_conns = max_conns;
        self
    }

    pub fn with_fail_timeout(mut self, timeout: Duration) -> Self {
        self.fail_timeout = timeout;
        self
    }

    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_check_down(mut self, check: CheckDownFn) -> Self {
        self.check_down = Some(check);
        self
    }

    /// Current number of in-flight calls.
    pub fn conns(&self) -> i64 {
        self.conns.load(Ordering::Relaxed)
    }

    /// Number of failures still being remembered.
    pub fn fails(&self) -> i32 {
        self.fails.load(Ordering::Relaxed)
    }

    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy.load(Ordering::Relaxed)
    }

    /// Force the host down (or clear the flag). Used by health checkers.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::Relaxed);
    }

    pub fn inc_fails(&self) {
        self.fails.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec_fails(&self) {
        self.fails.fetch_sub(1, Ordering::AcqRel);
    }

    /// Whether the host is down, via `check_down` if one is set.
    pub fn down(&self) -> bool {
        match &self.check_down {
            Some(check) => check(self),
            None => self.is_unhealthy() || self.fails() > 0,
        }
    }

    /// Whether the host has reached its connection limit.
    pub fn full(&self) -> bool {
        self.max_conns > 0 && self.conns() >= self.max_conns
    }

    pub fn available(&self) -> bool {
        !self.down() && !self.full()
    }

    /// Count a call in flight until the guard drops.
    pub fn connect(self: &Arc<Self>) -> ConnectionGuard {
        self.conns.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard { host: self.clone() }
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    host: Arc<UpstreamHost>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.host.conns.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_mark_host_down() {
        let host = UpstreamHost::new("http://10.0.0.1");
        assert!(host.available());

        host.inc_fails();
        assert!(host.down());
        assert!(!host.is_unhealthy());
        assert!(!host.full());
        assert!(!host.available());

        host.dec_fails();
        assert!(host.available());
    }

    #[test]
    fn test_unhealthy_flag() {
        let host = UpstreamHost::new("http://10.0.0.1");
        host.set_unhealthy(true);
        assert!(!host.available());
        host.set_unhealthy(false);
        assert!(host.available());
    }

    #[test]
    fn test_full_at_max_conns() {
        let host = Arc::new(UpstreamHost::new("http://10.0.0.1").with_max_conns(2));
        let first = host.connect();
        assert!(!host.full());
        let second = host.connect();
        assert!(host.full());
        assert!(!host.available());

        drop(second);
        assert_eq!(host.conns(), 1);
        assert!(!host.full());
        drop(first);
        assert_eq!(host.conns(), 0);
    }

    #[test]
    fn test_unlimited_never_full() {
        let host = Arc::new(UpstreamHost::new("http://10.0.0.1"));
        let guards: Vec<_> = (0..64).map(|_| host.connect()).collect();
        assert!(!host.full());
        drop(guards);
        assert_eq!(host.conns(), 0);
    }

    #[test]
    fn test_custom_check_down() {
        let host = UpstreamHost::new("http://10.0.0.1")
            .with_check_down(Arc::new(|h: &UpstreamHost| h.fails() > 2));
        host.inc_fails();
        assert!(!host.down());
        host.inc_fails();
        host.inc_fails();
        assert!(host.down());
    }
}
