//! The fixed CORS header set and its merge rules
//!
//! Every response the proxy produces carries these headers, including error
//! envelopes and preflight replies. The merge is an explicit ordered insert
//! over the response's header map, so on a key collision the proxy's value
//! always replaces whatever the backend sent.

use crate::dispatch::{empty_body, ProxyBody};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};

/// The CORS header set, in merge order. Names are kept lowercase to make the
/// case-insensitive replacement semantics of the merge explicit.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Authorization"),
    ("access-control-max-age", "86400"),
];

/// Merge the CORS header set into `headers`. Existing entries with the same
/// (case-insensitive) name are replaced.
pub fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

/// Terminal reply for an `OPTIONS` preflight: empty body, CORS headers only
pub fn preflight_response() -> Response<ProxyBody> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(empty_body())
        .expect("valid response builder");
    apply_cors(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_apply_cors_inserts_all_headers() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);

        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert_eq!(
            headers.get("Access-Control-Allow-Methods").unwrap(),
            "GET, POST, OPTIONS"
        );
        assert_eq!(
            headers.get("Access-Control-Allow-Headers").unwrap(),
            "Content-Type, Authorization"
        );
        assert_eq!(headers.get("Access-Control-Max-Age").unwrap(), "86400");
    }

    #[test]
    fn test_apply_cors_replaces_on_collision() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "access-control-allow-origin",
            HeaderValue::from_static("https://evil.example"),
        );
        apply_cors(&mut headers);

        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        // Replacement, not appending: a single value remains
        assert_eq!(
            headers.get_all("Access-Control-Allow-Origin").iter().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_preflight_response_is_empty_with_cors_only() {
        let response = preflight_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().len(), 4);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );

        let body = response.into_body().collect().await.expect("collect");
        assert!(body.to_bytes().is_empty());
    }
}
