//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, fallback handler)
//!     → forward.rs (match group, retry loop)
//!     → request.rs (sanitize, X-Forwarded-For)
//!     → body.rs (buffer once, replay per attempt)
//!     → headers.rs + replacer.rs (upstream header rules)
//!     → transport.rs (call backend, downstream header rules)
//!     → Send to client
//! ```

pub mod body;
pub mod forward;
pub mod headers;
pub mod replacer;
pub mod request;
pub mod server;
pub mod transport;

pub use forward::{Next, NotFound, Proxy};
pub use server::HttpServer;
