//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt fails:
//!     → health::passive (remember the failure for fail_timeout)
//!     → retries.rs (budget left? sleep try_interval, select again)
//!     → budget spent: report the last error as 502
//! ```
//!
//! # Design Decisions
//! - Retries fail over to whatever host the group selects next
//! - Oversized bodies and misconfiguration are never retried
//! - The only bound on a request's retries is its group's try duration

pub mod retries;
