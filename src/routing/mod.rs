//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (scan configured upstream groups)
//!     → matcher.rs (segment-aware prefix match)
//!     → Upstream::allowed_path (ignored sub-paths)
//!     → Return: most specific group, or None (next handler)
//! ```
//!
//! # Design Decisions
//! - Groups fixed at startup; hosts inside a group may change
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same group

pub mod matcher;
pub mod router;

pub use router::Router;
