//! # Client Components
//!
//! The client is split into two main components:
//!
//! ## Core Client ([`client`])
//! Handles the HTTP exchange itself: URL building, default headers, cookie
//! passthrough, body encoding and JSON parsing. It never looks at status codes.
//!
//! ## Client Middleware ([`middleware`])
//! The Session/Request Boundary:
//! - Bearer token lifecycle (restore, login, logout)
//! - 401 handling: token cleared, session ended, unauthorized handler invoked
//! - Error translation with the server's `detail`
//! - Typed endpoint helpers for discovery, swipes, matches and profiles
//!
//! ## Metrics ([`metrics`])
//! Optional per-request latency and outcome recording with JSON export.

pub mod client;
pub mod metrics;
pub mod middleware;

// Re-export for convenience
pub use client::ClientCore;
pub use metrics::ClientMetrics;
pub use middleware::{ClientMiddleware, RequestOptions};
