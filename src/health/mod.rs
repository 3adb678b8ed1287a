//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Passive checks (passive.rs):
//!     Transport error observed
//!     → Increment host failure count
//!     → Detached timer decrements it after fail_timeout
//!
//! Availability (load_balancer::host):
//!     down = unhealthy || fails > 0   (or a custom check)
//!     full = max_conns > 0 && conns >= max_conns
//! ```
//!
//! Active probing is external; probes only flip `UpstreamHost::set_unhealthy`
//! or replace a group's host set.

pub mod passive;
