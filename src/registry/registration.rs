//! What the gateway tells the registry about itself.

use std::time::Duration;

use uuid::Uuid;

use crate::config::validation::split_host_port;
use crate::config::RegistryConfig;
use crate::http::HEALTH_CHECK_PATH;
use crate::registry::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    /// Fresh per process; deregistration uses the same id.
    pub instance_id: Uuid,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    pub health_check_url: String,
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

impl ServiceRegistration {
    /// Build the registration from `registry.agent_addr` and the check
    /// settings.
    pub fn from_config(instance_id: Uuid, config: &RegistryConfig) -> Result<Self, RegistryError> {
        let (host, port) = split_host_port(&config.agent_addr)
            .filter(|(host, _)| !host.is_empty())
            .ok_or_else(|| RegistryError::InvalidAgentAddr {
                addr: config.agent_addr.clone(),
            })?;

        let url_host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        Ok(Self {
            instance_id,
            service_name: config.service_family_name.clone(),
            address: host.to_string(),
            port,
            health_check_url: format!("http://{url_host}:{port}{HEALTH_CHECK_PATH}"),
            check_interval: Duration::from_secs(config.check_interval_secs),
            check_timeout: Duration::from_secs(config.check_timeout_secs),
        })
    }
}

/// Render a duration the way the registry expects it ("5s", "1500ms").
pub(crate) fn duration_string(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
