//! Process-level errors.
//!
//! Per-request failures never reach this type: they are rendered as HTTP
//! responses where they happen.

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::lifecycle::LifecycleError;
use crate::net::{DrainError, ListenerError};
use crate::notify::NotifyError;
use crate::observability::ExportError;
use crate::registry::RegistryError;
use crate::routing::RouteError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("route table: {0}")]
    Route(#[from] RouteError),

    #[error("authorization client: {0}")]
    Authorization(#[from] AuthError),

    #[error("service registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("notifier: {0}")]
    Notify(#[from] NotifyError),

    #[error("drain: {0}")]
    Drain(#[from] DrainError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("span exporter: {0}")]
    Tracing(#[from] ExportError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
