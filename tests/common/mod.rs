//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{request::Parts, HeaderMap, Response},
};
use futures_util::future::BoxFuture;
use proxy_forwarder::error::TransportError;
use proxy_forwarder::http::headers::ResponseRewrite;
use proxy_forwarder::http::request::OutboundRequest;
use proxy_forwarder::http::transport::Forwarder;
use proxy_forwarder::load_balancer::{StaticUpstream, Upstream, UpstreamHost};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a programmable raw-TCP backend on an ephemeral port.
///
/// `f` receives the raw request head and returns `(status line, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 16 * 1024];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_string();

                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nServer: mock\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What a test forwarder received for one call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub host: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Forwarder that answers 200 with the request body and records each call.
#[derive(Debug, Default)]
pub struct Echo {
    pub seen: Mutex<Vec<Seen>>,
}

impl Echo {
    pub fn calls(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Forwarder for Echo {
    fn forward<'a>(
        &'a self,
        req: OutboundRequest<'a>,
        body: Option<Body>,
        rewrite: Option<&'a ResponseRewrite>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        Box::pin(async move {
            let bytes = match body {
                Some(b) => Some(
                    axum::body::to_bytes(b, usize::MAX)
                        .await
                        .map_err(TransportError::upstream)?,
                ),
                None => None,
            };
            self.seen.lock().unwrap().push(Seen {
                host: req.host.clone(),
                uri: req.uri.to_string(),
                headers: req.headers.into_owned(),
                body: bytes.clone(),
            });

            let mut response = Response::new(Body::from(bytes.unwrap_or_default()));
            response
                .headers_mut()
                .insert("server", "echo".parse().unwrap());
            if let Some(rewrite) = rewrite {
                rewrite.apply(response.headers_mut());
            }
            Ok(response)
        })
    }
}

/// Forwarder that always fails after draining the body, recording the order of calls.
#[derive(Debug)]
pub struct Failing {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

impl Forwarder for Failing {
    fn forward<'a>(
        &'a self,
        _req: OutboundRequest<'a>,
        body: Option<Body>,
        _rewrite: Option<&'a ResponseRewrite>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        self.log.lock().unwrap().push(self.name);
        let name = self.name;
        Box::pin(async move {
            // Consume the body like a real transport would before failing.
            if let Some(body) = body {
                let _ = axum::body::to_bytes(body, usize::MAX).await;
            }
            Err(TransportError::upstream(format!("{name} refused connection")))
        })
    }
}

/// Forwarder that reports an oversized body.
#[derive(Debug, Default)]
pub struct TooLarge {
    pub calls: AtomicUsize,
}

impl Forwarder for TooLarge {
    fn forward<'a>(
        &'a self,
        _req: OutboundRequest<'a>,
        _body: Option<Body>,
        _rewrite: Option<&'a ResponseRewrite>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(TransportError::BodyTooLarge { limit: 16 }) })
    }
}

/// Upstream wrapper counting `select` calls.
pub struct Counting {
    pub inner: StaticUpstream,
    pub selects: AtomicUsize,
}

impl Counting {
    pub fn new(inner: StaticUpstream) -> Arc<Self> {
        Arc::new(Self {
            inner,
            selects: AtomicUsize::new(0),
        })
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

impl Upstream for Counting {
    fn path_prefix(&self) -> &str {
        self.inner.path_prefix()
    }

    fn select(&self, req: &Parts) -> Option<Arc<UpstreamHost>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(req)
    }

    fn allowed_path(&self, path: &str) -> bool {
        self.inner.allowed_path(path)
    }

    fn try_duration(&self) -> Duration {
        self.inner.try_duration()
    }

    fn try_interval(&self) -> Duration {
        self.inner.try_interval()
    }

    fn max_body_size(&self) -> Option<u64> {
        self.inner.max_body_size()
    }
}
