//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Remember a backend failure for the host's fail timeout
//! - Forget it again without involving the request that observed it
//!
//! # Design Decisions
//! - The decrement runs on a detached task; it outlives the request
//! - Nothing awaits or cancels the pending decrement

use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::UpstreamHost;
use crate::observability::metrics;

/// Count a failure against `host` and schedule its expiry.
///
/// Does nothing when `timeout` is zero. Must be called within a tokio runtime.
pub fn record_failure(host: &Arc<UpstreamHost>, timeout: Duration) {
    if timeout.is_zero() {
        return;
    }

    host.inc_fails();
    metrics::record_backend_failure(&host.name);
    tracing::debug!(host = %host.name, fails = host.fails(), ?timeout, "Recorded upstream failure");

    let host = Arc::clone(host);
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        host.dec_fails();
    });
}
