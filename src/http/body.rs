//! Replayable request body.
//!
//! The inbound stream is drained once into memory. Each forwarding attempt
//! rewinds the buffer and takes a fresh [`Body`] from it, so retries never
//! touch the client connection again.

use std::io::{self, Cursor, Read, Seek};

use axum::body::{Body, Bytes, HttpBody};
use futures_util::StreamExt;

use crate::error::{ProxyError, TransportError};

/// Buffered copy of a request body that can be re-sent from the start.
#[derive(Debug)]
pub struct ReplayableBody {
    cursor: Cursor<Bytes>,
}

impl ReplayableBody {
    /// Drain `body` into memory, refusing bodies larger than `limit`.
    ///
    /// Returns `None` without reading when the body is known to be empty.
    /// With a limit, a declared length over it is rejected before reading
    /// and a stream stops being read as soon as it crosses it.
    pub async fn wrap(body: Body, limit: Option<u64>) -> Result<Option<Self>, ProxyError> {
        if body.is_end_stream() || body.size_hint().exact() == Some(0) {
            return Ok(None);
        }
        let bytes = match limit {
            Some(limit) => read_limited(body, limit).await?,
            None => axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(ProxyError::BodyRead)?,
        };
        Ok(Some(Self::from_bytes(bytes)))
    }

    pub fn from_bytes(bytes: Bytes) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset the read position to the start of the buffer.
    ///
    /// Must be called before every attempt.
    pub fn rewind(&mut self) -> Result<(), ProxyError> {
        self.cursor.rewind().map_err(ProxyError::Rewind)
    }

    /// Hand out the unread remainder as a request body and mark it consumed.
    pub fn take(&mut self) -> Body {
        let len = self.len();
        let pos = (self.cursor.position() as usize).min(len);
        let remaining = self.cursor.get_ref().slice(pos..);
        self.cursor.set_position(len as u64);
        Body::from(remaining)
    }
}

async fn read_limited(body: Body, limit: u64) -> Result<Bytes, ProxyError> {
    let too_large = || ProxyError::from(TransportError::BodyTooLarge { limit });
    if body.size_hint().lower() > limit {
        return Err(too_large());
    }

    let mut buf = Vec::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ProxyError::BodyRead)?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

impl Read for ReplayableBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_body_is_not_wrapped() {
        assert!(ReplayableBody::wrap(Body::empty(), None).await.unwrap().is_none());
        assert!(ReplayableBody::wrap(Body::from(""), Some(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rewind_reproduces_content() {
        let mut body = ReplayableBody::wrap(Body::from("hello upstream"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.len(), 14);

        for _ in 0..5 {
            body.rewind().unwrap();
            let mut out = Vec::new();
            body.read_to_end(&mut out).unwrap();
            assert_eq!(out, b"hello upstream");
        }
    }

    #[tokio::test]
    async fn test_take_without_rewind_is_empty() {
        let mut body = ReplayableBody::from_bytes(Bytes::from_static(b"payload"));

        body.rewind().unwrap();
        let first = axum::body::to_bytes(ReplayableBody::take(&mut body), usize::MAX).await.unwrap();
        assert_eq!(first, "payload");

        let skipped = axum::body::to_bytes(ReplayableBody::take(&mut body), usize::MAX).await.unwrap();
        assert!(skipped.is_empty());

        body.rewind().unwrap();
        let replayed = axum::body::to_bytes(ReplayableBody::take(&mut body), usize::MAX).await.unwrap();
        assert_eq!(replayed, "payload");
    }

    #[tokio::test]
    async fn test_partial_read_then_rewind() {
        let mut body = ReplayableBody::from_bytes(Bytes::from_static(b"0123456789"));
        let mut head = [0u8; 4];
        body.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"0123");

        body.rewind().unwrap();
        let all = axum::body::to_bytes(ReplayableBody::take(&mut body), usize::MAX).await.unwrap();
        assert_eq!(all, "0123456789");
    }

    #[tokio::test]
    async fn test_body_within_limit_is_buffered() {
        let body = ReplayableBody::wrap(Body::from("0123456789abcdef"), Some(16))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.len(), 16);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_is_rejected() {
        let err = ReplayableBody::wrap(Body::from("0123456789abcdefg"), Some(16))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_oversized_stream_stops_at_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = (0..1024).map(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(Bytes::from(vec![0u8; 64 * 1024]))
        });

        let body = Body::from_stream(futures_util::stream::iter(chunks));
        let err = ReplayableBody::wrap(body, Some(16)).await.unwrap_err();

        assert!(matches!(err, ProxyError::PayloadTooLarge(_)));
        assert_eq!(err.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }
}
