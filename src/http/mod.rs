//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::connection)
//!     → server.rs (router, tower-http layers)
//!     → middleware/trace_context.rs (server span)
//!     → middleware/authorization.rs (gate)
//!     → /health-check, or proxy.rs (route lookup, forward)
//!     → request.rs (rewrite target, forwarding headers)
//!     → response.rs (stream back, JSON errors)
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

/// Liveness endpoint. Never authorized and never routed to a backend.
pub const HEALTH_CHECK_PATH: &str = "/health-check";

pub use proxy::{Forwarder, ProxyError};
pub use server::{build_router, AppState, HttpServer, Stopped};
