//! Error taxonomy for the forwarding path.
//!
//! # Design Decisions
//! - Only `Transport` and `NoHostsAvailable` participate in the retry loop
//! - Every other variant short-circuits the request immediately
//! - The status a client sees is derived from the variant, never stored

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure reported by a forwarding transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request body is larger than the transport accepts.
    #[error("request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap any backend failure.
    pub fn upstream<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TransportError::Upstream(err.into())
    }
}

/// Error returned by the forwarding loop to the host framework.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to read downstream request body")]
    BodyRead(#[source] axum::Error),

    #[error("unable to rewind downstream request body")]
    Rewind(#[source] std::io::Error),

    #[error("no hosts available upstream")]
    NoHostsAvailable,

    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    PayloadTooLarge(TransportError),

    #[error("proxy for host '{0}' is nil")]
    Configuration(String),
}

impl ProxyError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BodyRead(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Rewind(_) | ProxyError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::NoHostsAvailable | ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the forwarding loop may try another host after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProxyError::NoHostsAvailable | ProxyError::Transport(_))
    }
}

impl From<TransportError> for ProxyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::BodyTooLarge { .. } => ProxyError::PayloadTooLarge(err),
            other => ProxyError::Transport(other),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, status.canonical_reason().unwrap_or("Proxy Error")).into_response()
    }
}
