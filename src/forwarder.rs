//! The edge forwarder: preflight short-circuit, URL rewrite, replay, relay
//!
//! `handle` never fails to produce a response. Transport failures become the
//! 503 envelope; application-level 4xx/5xx responses from the backend are not
//! errors and are relayed verbatim.

use crate::cors::{apply_cors, preflight_response};
use crate::dispatch::{Dispatch, ProxyBody};
use crate::error::unavailable_response;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::{Method, Request, Response, Uri};
use tracing::{debug, error};
use uuid::Uuid;

/// Header name for request ID
const X_REQUEST_ID: &str = "x-request-id";

/// Connection-scoped headers that must not be replayed in either direction
const HOP_BY_HOP_HEADERS: [&str; 9] = [
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

/// Forwards one request to the configured backend origin
pub struct EdgeForwarder<D> {
    dispatch: D,
    backend_base: String,
}

impl<D: Dispatch> EdgeForwarder<D> {
    /// `backend_base` is the origin all requests are rewritten to,
    /// e.g. `https://your-server.com` (no trailing slash).
    pub fn new(dispatch: D, backend_base: impl Into<String>) -> Self {
        Self {
            dispatch,
            backend_base: backend_base.into(),
        }
    }

    /// Access the underlying dispatcher
    pub fn dispatch_ref(&self) -> &D {
        &self.dispatch
    }

    /// Handle one inbound request. Always produces a response, and every
    /// response carries the CORS header set.
    pub async fn handle(&self, req: Request<ProxyBody>) -> Response<ProxyBody> {
        // Preflight is terminal: no backend contact, checked before anything else
        if req.method() == Method::OPTIONS {
            debug!(uri = %req.uri(), "Answering CORS preflight");
            return preflight_response();
        }

        // Generate or propagate request ID
        let request_id = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let target = rewrite_target(&self.backend_base, req.uri());

        let (mut parts, body) = req.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        // The client derives Host from the target URL; the edge host must not leak
        parts.headers.remove(hyper::header::HOST);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            parts.headers.insert(X_REQUEST_ID, value);
        }

        debug!(method = %parts.method, target = %target, request_id, "Forwarding request");

        let mut builder = Request::builder().method(parts.method).uri(target.as_str());
        if let Some(headers) = builder.headers_mut() {
            *headers = parts.headers;
        }
        let outbound = match builder.body(body) {
            Ok(outbound) => outbound,
            Err(e) => {
                error!(target = %target, error = %e, request_id, "Failed to build outbound request");
                return unavailable_response(e.to_string());
            }
        };

        match self.dispatch.send(outbound).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                apply_cors(&mut parts.headers);
                debug!(status = %parts.status, request_id, "Relaying backend response");
                Response::from_parts(parts, body)
            }
            Err(e) => {
                error!(error = %e, request_id, "Backend dispatch failed");
                unavailable_response(e.message())
            }
        }
    }
}

/// Build the outbound URL: backend base + inbound path + query. Scheme, host,
/// and port of the inbound request are discarded entirely.
pub fn rewrite_target(base: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}{}", base, path_and_query)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}
