//! Short-lived response cache for info endpoints
//!
//! The cache key is the full request URL only. Method and headers are not part
//! of the key, so two different methods on the same URL share one entry.

use crate::dispatch::{full_body, Dispatch, ProxyBody};
use crate::error::unavailable_response;
use crate::forwarder::EdgeForwarder;
use async_trait::async_trait;
use dashmap::DashMap;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use hyper::{Request, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A stored response snapshot
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn into_response(self) -> Response<ProxyBody> {
        let mut builder = Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder
            .body(full_body(self.body))
            .expect("snapshot rebuilds into a valid response")
    }
}

/// Capability interface over the shared response store. Implementations
/// provide their own concurrency safety; the forwarder never coordinates
/// access itself.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedResponse>;
    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration);
}

/// In-process store backed by a concurrent map. Expiry is enforced at read
/// time; expired entries are dropped on the next lookup.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Instant, CachedResponse)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (expires_at, value) = entry.value();
                if Instant::now() < *expires_at {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration) {
        self.entries.insert(key.to_string(), (Instant::now() + ttl, value));
    }
}

/// Wraps the edge forwarder with a response cache applied only to requests
/// whose path contains the configured marker (`/info` by default).
pub struct CachedForwarder<D, C> {
    inner: EdgeForwarder<D>,
    store: C,
    max_age: Duration,
    path_marker: String,
}

impl<D: Dispatch, C: CacheStore> CachedForwarder<D, C> {
    pub fn new(
        inner: EdgeForwarder<D>,
        store: C,
        max_age: Duration,
        path_marker: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            max_age,
            path_marker: path_marker.into(),
        }
    }

    /// Handle one request through the cache. A hit returns the stored snapshot
    /// without contacting the backend; a miss delegates to the edge forwarder
    /// and, for marker paths only, stores a snapshot before returning.
    pub async fn handle_cached(&self, req: Request<ProxyBody>) -> Response<ProxyBody> {
        let key = req.uri().to_string();
        let cacheable = req.uri().path().contains(&self.path_marker);

        if let Some(hit) = self.store.get(&key).await {
            debug!(key, "Cache hit");
            return hit.into_response();
        }

        let response = self.inner.handle(req).await;
        if !cacheable {
            return response;
        }

        // Snapshotting requires buffering the body; only marker paths pay this
        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(key, error = %e, "Backend body failed mid-stream, not caching");
                return unavailable_response(e.to_string());
            }
        };

        // Cache-Control goes on the stored snapshot, not the live reply
        let mut stored_headers = parts.headers.clone();
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", self.max_age.as_secs())) {
            stored_headers.insert(CACHE_CONTROL, value);
        }
        let snapshot = CachedResponse {
            status: parts.status,
            headers: stored_headers,
            body: bytes.clone(),
        };
        self.store.put(&key, snapshot, self.max_age).await;
        debug!(key, max_age_secs = self.max_age.as_secs(), "Stored response snapshot");

        Response::from_parts(parts, full_body(bytes))
    }
}
