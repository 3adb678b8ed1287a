//! Upstream lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over groups (acceptable for typical group counts)
//! - Longest matching prefix wins; ties keep configuration order
//! - Explicit `None` rather than a silent default

use std::sync::Arc;

use crate::load_balancer::Upstream;
use crate::routing::matcher::path_matches;

/// Selects the most specific upstream group for a path.
pub struct Router {
    upstreams: Vec<Arc<dyn Upstream>>,
}

impl Router {
    pub fn new(upstreams: Vec<Arc<dyn Upstream>>) -> Self {
        Self { upstreams }
    }

    /// Find the best group for `path`, if any.
    pub fn match_request(&self, path: &str) -> Option<&Arc<dyn Upstream>> {
        let mut best: Option<&Arc<dyn Upstream>> = None;
        let mut longest = 0;

        for upstream in &self.upstreams {
            let base = upstream.path_prefix();
            if !path_matches(path, base) || !upstream.allowed_path(path) {
                continue;
            }
            if best.is_none() || base.len() > longest {
                longest = base.len();
                best = Some(upstream);
            }
        }

        best
    }
}
