//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! RegistryConfig + instance id
//!     → registration.rs (ServiceRegistration: address, port, health check)
//!     → consul.rs (Consul agent HTTP API)
//! ```
//!
//! # Design Decisions
//! - The registry is a trait so the lifecycle controller can be driven by
//!   test doubles
//! - The registry polls the gateway's health check itself; the gateway runs
//!   no health loop of its own

pub mod consul;
pub mod registration;

use async_trait::async_trait;
use uuid::Uuid;

pub use consul::ConsulRegistry;
pub use registration::ServiceRegistration;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid agent address '{addr}': expected host:port")]
    InvalidAgentAddr { addr: String },
    #[error("invalid registry address '{0}'")]
    InvalidRegistryAddr(String),
    #[error("registry unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A service catalog the gateway announces itself in.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Announce this instance. Must complete before traffic is accepted.
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError>;

    /// Withdraw the instance registered under `instance_id`.
    async fn deregister(&self, instance_id: &Uuid) -> Result<(), RegistryError>;
}
