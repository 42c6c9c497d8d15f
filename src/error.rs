//! Transport errors and the 503 JSON error envelope

use crate::cors::apply_cors;
use crate::dispatch::{full_body, ProxyBody};
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Fixed `error` field of the envelope
pub const BACKEND_UNAVAILABLE: &str = "Backend service unavailable";

/// A transport-level failure while contacting or reading from the backend.
///
/// Carries only a human-readable message: the envelope's `details` field needs
/// a well-defined textual source, not the original error's type structure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DispatchError {
    message: String,
}

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// JSON body returned when the backend cannot be reached
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Fixed error label
    pub error: &'static str,
    /// Message of the caught transport failure
    pub details: String,
}

impl ErrorEnvelope {
    pub fn backend_unavailable(details: impl Into<String>) -> Self {
        Self {
            error: BACKEND_UNAVAILABLE,
            details: details.into(),
        }
    }

    /// Serialize to JSON; field order is `error` then `details`
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","details":"{}"}}"#,
                self.error,
                self.details.replace('"', "\\\"")
            )
        })
    }
}

/// Build the 503 envelope response, CORS headers included
pub fn unavailable_response(details: impl Into<String>) -> Response<ProxyBody> {
    let envelope = ErrorEnvelope::backend_unavailable(details);
    let mut response = Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(full_body(envelope.to_json()))
        .expect("valid response builder");
    apply_cors(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_envelope_json_shape() {
        let envelope = ErrorEnvelope::backend_unavailable("connect ECONNREFUSED");
        assert_eq!(
            envelope.to_json(),
            r#"{"error":"Backend service unavailable","details":"connect ECONNREFUSED"}"#
        );
    }

    #[test]
    fn test_dispatch_error_message() {
        let err = DispatchError::new("dns error: no such host");
        assert_eq!(err.message(), "dns error: no such host");
        assert_eq!(err.to_string(), "dns error: no such host");
    }

    #[tokio::test]
    async fn test_unavailable_response() {
        let response = unavailable_response("connection refused");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );

        let body = response.into_body().collect().await.expect("collect");
        assert_eq!(
            body.to_bytes(),
            r#"{"error":"Backend service unavailable","details":"connection refused"}"#.as_bytes()
        );
    }
}
