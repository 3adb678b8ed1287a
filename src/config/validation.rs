//! Configuration validation.
//!
//! # Design Decisions
//! - Serde handles syntax; this module checks meaning
//! - Returns all validation errors, not just the first
//! - Pure function: `&ProxyConfig → Result<(), Vec<ValidationError>>`

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("upstream #{index}: path prefix '{from}' must start with '/'")]
    PathPrefix { index: usize, from: String },

    #[error("upstream '{from}' has no hosts")]
    NoHosts { from: String },

    #[error("upstream '{from}' has an empty host name")]
    EmptyHost { from: String },

    #[error("upstream '{from}' uses the header policy without policy_header")]
    MissingPolicyHeader { from: String },

    #[error("upstream '{from}' has negative max_conns")]
    NegativeMaxConns { from: String },
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    for (index, upstream) in config.upstreams.iter().enumerate() {
        let from = upstream.from.clone();
        if !upstream.from.is_empty() && !upstream.from.starts_with('/') {
            errors.push(ValidationError::PathPrefix { index, from: from.clone() });
        }
        if upstream.to.is_empty() {
            errors.push(ValidationError::NoHosts { from: from.clone() });
        }
        if upstream.to.iter().any(|h| h.trim().is_empty()) {
            errors.push(ValidationError::EmptyHost { from: from.clone() });
        }
        if upstream.policy == crate::load_balancer::policies::PolicyKind::Header
            && upstream.policy_header.as_deref().unwrap_or_default().is_empty()
        {
            errors.push(ValidationError::MissingPolicyHeader { from: from.clone() });
        }
        if upstream.max_conns < 0 {
            errors.push(ValidationError::NegativeMaxConns { from });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
