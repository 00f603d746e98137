//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → passed by reference into the lifecycle controller
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthorizationConfig, CorsConfig, EndpointConfig, GatewayConfig, ListenerConfig, LoggerConfig,
    NotifierConfig,
    ObservabilityConfig, RegistryConfig, ServiceConfig, TimeoutConfig, TracingConfig,
};
