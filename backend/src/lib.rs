//! Timeline feed backend library.
//!
//! Implements the write/read duality of a home timeline: eager
//! fan-out-on-write through a bounded batch executor with an at-least-once
//! retry pipeline, read-time merging for high-fan-out authors, and a
//! read-through timeline cache, all behind pluggable storage ports.

pub mod api;
pub mod doc;
pub mod domain;
pub mod middleware;
pub mod outbound;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
/// Request trace middleware re-export for application wiring.
pub use middleware::Trace;
