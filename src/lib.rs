//! Edgegate - an edge proxy in front of a single backend origin
//!
//! This library provides a small forwarding proxy that:
//! - Relays every inbound HTTP request to one configured backend base URL,
//!   preserving path, query, method, headers, and body (streamed end to end)
//! - Injects a fixed set of CORS headers on every response it produces
//! - Answers `OPTIONS` preflight requests directly, without contacting the backend
//! - Converts transport failures into a 503 JSON envelope instead of dropping
//!   the connection
//! - Optionally caches responses for `/info` endpoints in memory for an hour

pub mod cache;
pub mod config;
pub mod cors;
pub mod dispatch;
pub mod error;
pub mod forwarder;
pub mod proxy;
