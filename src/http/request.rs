//! Outbound request preparation.
//!
//! # Responsibilities
//! - Derive the upstream request from the inbound one
//! - Strip hop-by-hop headers without touching the caller's map
//! - Record the client address in `X-Forwarded-For`
//! - Keep the raw (escaped) path exactly as received

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::http::{
    header::{self, HeaderName},
    request::Parts,
    HeaderMap, HeaderValue, Method, Uri, Version,
};

/// Headers that only describe the client connection and are never forwarded.
pub const HOP_HEADERS: [&str; 11] = [
    "alt-svc",
    "alternate-protocol",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Request as it will be handed to a forwarding transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest<'a> {
    pub method: Method,
    /// Path and query as received; never re-encoded.
    pub uri: Uri,
    pub version: Version,
    /// Value of the `Host` header sent upstream.
    pub host: String,
    pub headers: Cow<'a, HeaderMap>,
    /// False when the inbound request declared `Content-Length: 0`.
    pub has_body: bool,
}

impl OutboundRequest<'_> {
    /// Set basic credentials unless an `Authorization` header is present.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) {
        use base64::prelude::*;

        let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
        if let Ok(value) = HeaderValue::try_from(format!("Basic {encoded}")) {
            self.headers.to_mut().insert(header::AUTHORIZATION, value);
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Build the outbound request for `parts`.
pub fn prepare<'a>(parts: &'a Parts, remote_addr: Option<&str>) -> OutboundRequest<'a> {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let mut outreq = OutboundRequest {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        version: parts.version,
        host,
        headers: Cow::Borrowed(&parts.headers),
        has_body: content_length(&parts.headers) != Some(0),
    };

    strip_hop_headers(&mut outreq.headers);

    if let Some((client_ip, _)) = remote_addr.and_then(split_host_port) {
        let forwarded = match joined(&outreq.headers, &X_FORWARDED_FOR) {
            Some(prior) => format!("{prior}, {client_ip}"),
            None => client_ip,
        };
        if let Ok(value) = HeaderValue::try_from(forwarded) {
            outreq.headers.to_mut().insert(X_FORWARDED_FOR.clone(), value);
        }
    }

    outreq
}

/// Remove hop-by-hop headers, cloning a borrowed map only if one is present.
pub fn strip_hop_headers(headers: &mut Cow<'_, HeaderMap>) {
    let listed = connection_listed(headers);
    let present = HOP_HEADERS.iter().any(|h| headers.contains_key(*h))
        || listed.iter().any(|h| headers.contains_key(h));
    if !present {
        return;
    }

    let owned = headers.to_mut();
    for name in HOP_HEADERS {
        owned.remove(name);
    }
    for name in listed {
        owned.remove(name);
    }
}

/// Header names announced as hop-by-hop by the `Connection` header.
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::try_from(token.trim()).ok())
        .collect()
}

fn joined(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Split `host:port` (or `[v6]:port`) into its parts.
pub fn split_host_port(addr: &str) -> Option<(String, String)> {
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return Some((sock.ip().to_string(), sock.port().to_string()));
    }
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() || host.contains(':') || port.is_empty() {
        return None;
    }
    Some((host.to_string(), port.to_string()))
}
