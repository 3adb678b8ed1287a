//! The forwarding loop.
//!
//! ```text
//! MATCH ──none──▶ next handler
//!   │
//!   ▼
//! SELECT ──none──▶ (retry check)
//!   │
//!   ▼
//! PREPARE → CALL ──ok──────────▶ SUCCESS (transport response)
//!             │──body too big──▶ 413
//!             └──error─────────▶ fail accounting → retry check
//!                                   │ budget left: sleep, SELECT
//!                                   └ spent: 502 with last error
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, request::Parts, Request, Response, StatusCode},
};
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::ProxyError;
use crate::health::passive;
use crate::http::body::ReplayableBody;
use crate::http::headers::ResponseRewrite;
use crate::http::replacer::Replacer;
use crate::http::request::{self, OutboundRequest};
use crate::load_balancer::{Upstream, UpstreamHost};
use crate::observability::metrics;
use crate::resilience::retries::TryBudget;
use crate::routing::Router;

/// Handler that receives requests no upstream group claims.
pub trait Next: Send + Sync {
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response<Body>>;
}

impl<F, Fut> Next for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Response<Body>> + Send + 'static,
{
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        Box::pin(self(req))
    }
}

/// Default next handler: 404.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotFound;

impl Next for NotFound {
    fn call(&self, _req: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        Box::pin(async {
            let mut response = Response::new(Body::from("No upstream configured for path"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        })
    }
}

/// Proxy middleware: routes, forwards and retries.
pub struct Proxy {
    router: Router,
    next: Arc<dyn Next>,
}

impl Proxy {
    pub fn new(upstreams: Vec<Arc<dyn Upstream>>, next: Arc<dyn Next>) -> Self {
        Self {
            router: Router::new(upstreams),
            next,
        }
    }

    /// Serve one request.
    ///
    /// Unmatched requests go to the next handler and its response is
    /// returned untouched. Otherwise the response comes from the transport,
    /// or the error describes why no backend produced one.
    pub async fn serve(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let Some(upstream) = self.router.match_request(req.uri().path()) else {
            metrics::record_unmatched();
            return Ok(self.next.call(req).await);
        };

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        let (parts, body) = req.into_parts();

        let replacer = Replacer::new(&parts, remote_addr.as_deref());
        let outreq = request::prepare(&parts, remote_addr.as_deref());

        let mut body = if outreq.has_body {
            ReplayableBody::wrap(body, upstream.max_body_size()).await?
        } else {
            None
        };

        let budget = TryBudget::start(upstream.try_duration(), upstream.try_interval());
        let mut backend_err: Option<ProxyError> = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let Some(host) = upstream.select(&parts) else {
                tracing::debug!(upstream = %upstream.path_prefix(), attempt, "No upstream host available");
                backend_err.get_or_insert(ProxyError::NoHostsAvailable);
                if !budget.keep_retrying().await {
                    break;
                }
                metrics::record_retry(upstream.path_prefix());
                continue;
            };

            match self
                .attempt(&parts, &outreq, &mut body, &host, &replacer)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        upstream = %upstream.path_prefix(),
                        host = %host.name,
                        attempt,
                        error = %err,
                        "Upstream attempt failed"
                    );
                    passive::record_failure(&host, host.fail_timeout);
                    backend_err = Some(err);
                }
            }

            if !budget.keep_retrying().await {
                break;
            }
            metrics::record_retry(upstream.path_prefix());
        }

        tracing::warn!(
            upstream = %upstream.path_prefix(),
            attempts = attempt,
            elapsed = ?budget.elapsed(),
            "Upstream retries exhausted"
        );
        Err(backend_err.unwrap_or(ProxyError::NoHostsAvailable))
    }

    /// One PREPARE + CALL against `host`.
    async fn attempt(
        &self,
        parts: &Parts,
        base: &OutboundRequest<'_>,
        body: &mut Option<ReplayableBody>,
        host: &Arc<UpstreamHost>,
        replacer: &Replacer,
    ) -> Result<Response<Body>, ProxyError> {
        let mut outreq = base.clone();
        let mut replacer = replacer.clone();
        replacer.set("upstream", host.name.clone());

        // A backend's name may carry more than the host, so isolate it.
        match Url::parse(&host.name).ok().filter(|u| u.has_host()) {
            Some(url) => {
                outreq.host = url[url::Position::BeforeHost..url::Position::AfterPort].to_string();
                if !outreq.headers.contains_key(header::AUTHORIZATION)
                    && (!url.username().is_empty() || url.password().is_some())
                {
                    let username = decode_userinfo(url.username());
                    let password = decode_userinfo(url.password().unwrap_or_default());
                    outreq.set_basic_auth(&username, &password);
                }
            }
            None => outreq.host = host.name.clone(),
        }

        let Some(forwarder) = host.forwarder.clone() else {
            return Err(ProxyError::Configuration(host.name.clone()));
        };

        if let Some(rules) = &host.upstream_headers {
            rules.apply(outreq.headers.to_mut(), &replacer);
            if rules.writes(&header::HOST) {
                if let Some(value) = outreq
                    .headers
                    .get_all(header::HOST)
                    .iter()
                    .last()
                    .and_then(|v| v.to_str().ok())
                {
                    outreq.host = value.to_string();
                }
            }
        }

        let rewrite = host
            .downstream_headers
            .clone()
            .map(|rules| ResponseRewrite::new(rules, replacer.clone()));

        let outbound_body = match body.as_mut() {
            Some(buffered) => {
                buffered.rewind()?;
                Some(buffered.take())
            }
            None => None,
        };

        tracing::debug!(
            method = %parts.method,
            path = %outreq.path(),
            host = %host.name,
            "Forwarding request upstream"
        );

        let _conn = host.connect();
        forwarder
            .forward(outreq, outbound_body, rewrite.as_ref())
            .await
            .map_err(ProxyError::from)
    }
}

fn decode_userinfo(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
