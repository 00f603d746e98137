//! Start/stop notifications.
//!
//! The gateway announces when an instance starts serving and when it has
//! stopped. Without a configured endpoint notifications are dropped.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::config::validation::base_url;
use crate::config::NotifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid notifier address '{0}'")]
    InvalidAddress(String),
    #[error("notifier unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notifier rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, level: Level, message: &str) -> Result<(), NotifyError>;
}

/// Build the notifier described by `config`.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let notifier: Arc<dyn Notifier> = match &config.addr {
        Some(addr) => Arc::new(HttpNotifier::new(
            addr,
            Duration::from_secs(config.timeout_secs),
        )?),
        None => Arc::new(NoopNotifier),
    };
    Ok(notifier)
}

pub fn launched_message(service: &str, instance_id: &Uuid) -> String {
    format!("{service}: {instance_id} is launched!")
}

pub fn stopped_message(service: &str, instance_id: &Uuid) -> String {
    format!("{service}: {instance_id} is gracefully stopped!")
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    /// Unix seconds, UTC.
    time: u64,
    level: Level,
    message: &'a str,
}

/// Posts JSON messages to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpNotifier {
    pub fn new(addr: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let endpoint = base_url(addr).map_err(|_| NotifyError::InvalidAddress(addr.to_string()))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, level: Level, message: &str) -> Result<(), NotifyError> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&Message {
                time,
                level,
                message,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        tracing::debug!(message, "Notification sent");
        Ok(())
    }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _level: Level, message: &str) -> Result<(), NotifyError> {
        tracing::debug!(message, "No notifier configured, message dropped");
        Ok(())
    }
}
