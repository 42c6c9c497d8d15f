//! Outbound dispatch to the backend origin
//!
//! The forwarder talks to the backend through the [`Dispatch`] trait so tests
//! can substitute a mock backend. The production implementation wraps a shared
//! `reqwest` client and streams bodies in both directions.

use crate::error::DispatchError;
use async_trait::async_trait;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyDataStream, BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{HeaderMap, CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{Request, Response};
use std::time::Duration;

/// Boxed error type used for proxied body streams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type flowing through the proxy: inbound hyper bodies, outbound
/// backend streams, and fixed payloads all erase to this. Boxed unsync
/// because relayed backend streams are `Send` but not `Sync`.
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Build a fixed-payload body
pub fn full_body(bytes: impl Into<Bytes>) -> ProxyBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build an empty body
pub fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Capability to send one request to the backend and obtain its response.
///
/// Any failure to produce a response (DNS, connect, TLS, timeout, malformed
/// response) is a [`DispatchError`]; an application-level 4xx/5xx from the
/// backend is a successful dispatch.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn send(&self, req: Request<ProxyBody>) -> Result<Response<ProxyBody>, DispatchError>;
}

/// Dispatcher backed by a shared `reqwest` client (rustls for https origins)
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Create a dispatcher. When `request_timeout` is `None`, requests wait on
    /// the backend indefinitely.
    pub fn new(request_timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

/// Whether the inbound request carries a body worth streaming upstream.
/// Bodyless requests must not grow a chunked transfer encoding on replay.
fn has_request_body(headers: &HeaderMap, body: &ProxyBody) -> bool {
    use hyper::body::Body;

    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    if let Some(len) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return len > 0;
    }
    // No framing headers (HTTP/2, or a synthetic request): trust the body itself
    body.size_hint().upper() != Some(0)
}

#[async_trait]
impl Dispatch for HttpDispatcher {
    async fn send(&self, req: Request<ProxyBody>) -> Result<Response<ProxyBody>, DispatchError> {
        let (parts, body) = req.into_parts();

        let url = parts
            .uri
            .to_string()
            .parse::<reqwest::Url>()
            .map_err(|e| DispatchError::new(e.to_string()))?;

        let streamed_body = has_request_body(&parts.headers, &body);
        let mut outbound = self.client.request(parts.method, url).headers(parts.headers);
        if streamed_body {
            outbound = outbound.body(reqwest::Body::wrap_stream(BodyDataStream::new(body)));
        }

        let backend = outbound
            .send()
            .await
            .map_err(|e| DispatchError::new(e.to_string()))?;

        let status = backend.status();
        let headers = backend.headers().clone();

        let stream = backend
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(BoxError::from);

        let mut response = Response::builder().status(status);
        if let Some(response_headers) = response.headers_mut() {
            *response_headers = headers;
        }
        response
            .body(StreamBody::new(stream).boxed_unsync())
            .map_err(|e| DispatchError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_has_request_body() {
        let mut headers = HeaderMap::new();
        assert!(!has_request_body(&headers, &empty_body()));
        assert!(has_request_body(&headers, &full_body("data")));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert!(!has_request_body(&headers, &empty_body()));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("128"));
        assert!(has_request_body(&headers, &empty_body()));

        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert!(has_request_body(&headers, &empty_body()));
    }

    #[tokio::test]
    async fn test_full_and_empty_bodies() {
        let collected = full_body("payload").collect().await.expect("collect");
        assert_eq!(collected.to_bytes(), Bytes::from("payload"));

        let collected = empty_body().collect().await.expect("collect");
        assert!(collected.to_bytes().is_empty());
    }
}
