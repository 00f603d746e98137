//! Authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → gate.rs (health-check bypass, credential extraction)
//!     → client.rs (POST /auth/is-access-allowed, traced)
//!     → GateOutcome: Bypass | Allowed | Denied | UpstreamError
//! ```
//!
//! # Design Decisions
//! - Fail closed: any error talking to the service denies the request
//! - One call per request; decisions are never cached

pub mod client;
pub mod gate;

use serde::{Deserialize, Serialize};

pub use client::AuthorizationClient;
pub use gate::{find_credential, GateOutcome};

/// Question put to the authorization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRequest {
    /// Opaque bearer credential, sent as the `Authorization` header.
    #[serde(skip)]
    pub credential: String,
    /// Request URI.
    pub resource: String,
    /// HTTP method.
    pub action: String,
}

/// Answer from the authorization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AuthorizationDecision {
    /// A missing field decodes as a denial.
    #[serde(rename = "ok", default)]
    pub allowed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid authorization service address '{0}'")]
    InvalidAddress(String),
    #[error("authorization service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("authorization service timed out")]
    Timeout,
    #[error("undecodable authorization response (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: reqwest::Error,
    },
}
