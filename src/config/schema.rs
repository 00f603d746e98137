//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address of the public HTTP surface (e.g., "0.0.0.0:8080").
    pub addr: String,

    /// Base URL of the authorization service.
    pub permission_addr: String,

    /// Backend services and the routes each of them owns.
    #[serde(alias = "proxy_services")]
    pub services: Vec<ServiceConfig>,

    /// Upper bound on the drain wait during shutdown, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,

    pub listener: ListenerConfig,

    pub authorization: AuthorizationConfig,

    pub timeouts: TimeoutConfig,

    /// Service registry (Consul agent) settings.
    #[serde(alias = "consul")]
    pub registry: RegistryConfig,

    pub tracing: TracingConfig,

    pub logger: LoggerConfig,

    pub notifier: NotifierConfig,

    pub cors: CorsConfig,

    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            permission_addr: "http://127.0.0.1:8081".to_string(),
            services: Vec::new(),
            shutdown_timeout_secs: 5,
            max_body_size: 10 * 1024 * 1024, // 10MB
            listener: ListenerConfig::default(),
            authorization: AuthorizationConfig::default(),
            timeouts: TimeoutConfig::default(),
            registry: RegistryConfig::default(),
            tracing: TracingConfig::default(),
            logger: LoggerConfig::default(),
            notifier: NotifierConfig::default(),
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
        }
    }
}

/// A backend service and the endpoints routed to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Backend address (e.g., "svc-a:9000").
    pub addr: String,

    /// Routes served by this backend.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// A single (method, path pattern) route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Route template, e.g. "/widgets/{id}".
    pub uri: String,

    /// HTTP verb in upper case.
    pub method: String,
}

/// Authorization service client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Timeout for a single authorization call, in seconds.
    pub timeout_secs: u64,
}

impl AuthorizationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Timeout configuration for forwarded requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a backend to produce response headers, in seconds.
    pub upstream_secs: u64,
}

impl TimeoutConfig {
    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { upstream_secs: 30 }
    }
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Consul HTTP API address.
    pub addr: String,

    /// Address ("host:port") under which this instance is announced.
    pub agent_addr: String,

    /// Service name shared by all gateway instances.
    pub service_family_name: String,

    /// Health check polling interval in seconds.
    pub check_interval_secs: u64,

    /// Per-check timeout in seconds.
    pub check_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8500".to_string(),
            agent_addr: "127.0.0.1:8080".to_string(),
            service_family_name: "gateway".to_string(),
            check_interval_secs: 5,
            check_timeout_secs: 3,
        }
    }
}

/// Distributed tracing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Service name attached to every reported span.
    pub service_name: String,

    /// Whether traces started by the gateway itself are sampled.
    pub sample_roots: bool,

    /// OTLP (gRPC) collector endpoint, e.g. "http://jaeger:4317". Spans are
    /// only logged when unset.
    pub agent_addr: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "gateway".to_string(),
            sample_roots: true,
            agent_addr: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Startup/shutdown notification channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Notification endpoint. Notifications are disabled when unset.
    #[serde(alias = "tg_bot_addr")]
    pub addr: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            addr: None,
            timeout_secs: 30,
        }
    }
}

/// Cross-origin resource sharing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,

    /// Methods advertised to browsers in preflight responses.
    pub allow_methods: Vec<String>,

    /// Request headers browsers may send.
    pub allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_methods: vec!["PUT".to_string(), "POST".to_string()],
            allow_headers: [
                "Origin",
                "Content-Length",
                "Content-Type",
                "Authorization",
                "Access-Control-Expose-Headers",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus scrape endpoint bind address. No exporter when unset.
    pub metrics_address: Option<String>,
}
