//! Consul agent registry.
//!
//! Talks to the local agent's HTTP API:
//! - `PUT /v1/agent/service/register`
//! - `PUT /v1/agent/service/deregister/{id}`

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::config::validation::base_url;
use crate::registry::registration::duration_string;
use crate::registry::{RegistryError, ServiceRegistration, ServiceRegistry};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: String,
    name: &'a str,
    address: &'a str,
    port: u16,
    check: AgentServiceCheck<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck<'a> {
    #[serde(rename = "HTTP")]
    http: &'a str,
    interval: String,
    timeout: String,
}

impl<'a> From<&'a ServiceRegistration> for AgentServiceRegistration<'a> {
    fn from(registration: &'a ServiceRegistration) -> Self {
        Self {
            id: registration.instance_id.to_string(),
            name: &registration.service_name,
            address: &registration.address,
            port: registration.port,
            check: AgentServiceCheck {
                http: &registration.health_check_url,
                interval: duration_string(registration.check_interval),
                timeout: duration_string(registration.check_timeout),
            },
        }
    }
}

/// Registry backed by a Consul agent.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    http: reqwest::Client,
    base: Url,
}

impl ConsulRegistry {
    pub fn new(addr: &str) -> Result<Self, RegistryError> {
        let base = base_url(addr).map_err(|_| RegistryError::InvalidRegistryAddr(addr.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RegistryError> {
        self.base
            .join(path)
            .map_err(|_| RegistryError::InvalidRegistryAddr(self.base.to_string()))
    }

    async fn put(&self, url: Url, body: Option<&AgentServiceRegistration<'_>>) -> Result<(), RegistryError> {
        let mut request = self.http.put(url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let url = self.endpoint("/v1/agent/service/register")?;
        let payload = AgentServiceRegistration::from(registration);
        debug!(url = %url, payload = ?payload, "Registering service");

        self.put(url, Some(&payload)).await?;
        info!(
            service_id = %registration.instance_id,
            service = %registration.service_name,
            address = %registration.address,
            port = registration.port,
            "Service registered with Consul"
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &Uuid) -> Result<(), RegistryError> {
        let url = self.endpoint(&format!("/v1/agent/service/deregister/{instance_id}"))?;
        self.put(url, None).await?;
        info!(service_id = %instance_id, "Service deregistered from Consul");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_payload() {
        let id = Uuid::new_v4();
        let registration = ServiceRegistration {
            instance_id: id,
            service_name: "gateway".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8080,
            health_check_url: "http://10.0.0.5:8080/health-check".to_string(),
            check_interval: Duration::from_secs(5),
            check_timeout: Duration::from_secs(3),
        };

        let payload = serde_json::to_value(AgentServiceRegistration::from(&registration)).unwrap();
        assert_eq!(
            payload,
            json!({
                "ID": id.to_string(),
                "Name": "gateway",
                "Address": "10.0.0.5",
                "Port": 8080,
                "Check": {
                    "HTTP": "http://10.0.0.5:8080/health-check",
                    "Interval": "5s",
                    "Timeout": "3s"
                }
            })
        );
    }

    #[test]
    fn endpoints_accept_bare_host() {
        let registry = ConsulRegistry::new("127.0.0.1:8500").unwrap();
        let id = Uuid::nil();
        assert_eq!(
            registry
                .endpoint(&format!("/v1/agent/service/deregister/{id}"))
                .unwrap()
                .as_str(),
            "http://127.0.0.1:8500/v1/agent/service/deregister/00000000-0000-0000-0000-000000000000"
        );
    }
}
