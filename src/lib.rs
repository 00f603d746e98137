//! Authorizing API gateway.
//!
//! Every inbound request is checked against an external authorization
//! service, matched against a static route table, and forwarded to its
//! backend. The gateway registers itself with a service registry while it
//! serves and withdraws before draining.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ auth (gate) ──▶ routing ──▶ http::proxy ──▶ Backend
//!                                        │                                           │
//!                                        └──────── observability (spans, metrics) ───┘
//!
//!     lifecycle::controller: build routes → bind → registry.register → serve
//!                            → signal → stop accepting → registry.deregister → drain
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod notify;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use lifecycle::{Gateway, GatewayHandle, LifecycleState};
