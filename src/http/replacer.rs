//! Placeholder substitution for header rule values.
//!
//! Tokens look like `{name}`. Request header values are addressed with
//! `{>Header-Name}`. Tokens that cannot be resolved are left untouched.

use std::collections::HashMap;

use axum::http::{header, request::Parts, HeaderMap, Version};

use crate::http::request::split_host_port;

/// Resolves placeholders against one inbound request.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    values: HashMap<&'static str, String>,
    custom: HashMap<String, String>,
    request_headers: HeaderMap,
}

impl Replacer {
    /// Capture the request-derived values once per request.
    pub fn new(parts: &Parts, remote_addr: Option<&str>) -> Self {
        let mut values = HashMap::new();

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();
        let (hostname, port) =
            split_host_port(&host).unwrap_or_else(|| (host.clone(), String::new()));

        values.insert("method", parts.method.to_string());
        values.insert(
            "scheme",
            parts.uri.scheme_str().unwrap_or("http").to_string(),
        );
        values.insert("host", host.clone());
        values.insert("hostname", hostname);
        values.insert("port", port);
        values.insert("path", parts.uri.path().to_string());
        values.insert("query", parts.uri.query().unwrap_or_default().to_string());
        values.insert(
            "uri",
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        );
        values.insert("proto", proto(parts.version).to_string());
        if let Some((ip, _)) = remote_addr.and_then(split_host_port) {
            values.insert("remote", ip);
        }

        Self {
            values,
            custom: HashMap::new(),
            request_headers: parts.headers.clone(),
        }
    }

    /// Bind an extra placeholder, e.g. `upstream` for the selected host.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.insert(key.into(), value.into());
    }

    /// Substitute every resolvable placeholder in `input`.
    pub fn replace(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let token = &after[..close];
                    match self.lookup(token) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push('{');
                            out.push_str(token);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, token: &str) -> Option<String> {
        if let Some(name) = token.strip_prefix('>') {
            let joined = self
                .request_headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(",");
            return (!joined.is_empty()).then_some(joined);
        }
        self.custom
            .get(token)
            .or_else(|| self.values.get(token))
            .cloned()
    }
}

fn proto(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}
