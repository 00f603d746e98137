//! Shared utilities for integration tests.
//!
//! Mock services are small axum apps bound to ephemeral ports. Test doubles
//! for the registry and notifier write into a shared [`EventLog`] so tests
//! can assert ordering across components.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::config::{EndpointConfig, GatewayConfig, ServiceConfig};
use api_gateway::lifecycle::{Dependencies, Gateway, GatewayHandle, LifecycleState};
use api_gateway::notify::{Level, Notifier, NotifyError};
use api_gateway::observability::{FinishedSpan, SpanReporter, Tracer};
use api_gateway::registry::{RegistryError, ServiceRegistration, ServiceRegistry};
use api_gateway::GatewayError;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Ordered record of what happened, shared by every double in a test.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A request as seen by a mock service.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct BackendState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    delay: Duration,
    events: EventLog,
}

/// Backend echoing what it received; records every request.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        Self::start_with(Duration::ZERO, EventLog::default()).await
    }

    /// Backend that waits `delay` before answering and logs
    /// `backend:start` / `backend:done` around it.
    pub async fn start_with(delay: Duration, events: EventLog) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = BackendState {
            requests: requests.clone(),
            delay,
            events,
        };
        let app = Router::new().fallback(backend_handler).with_state(state);
        Self {
            addr: serve(app).await,
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn backend_handler(
    State(state): State<BackendState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.events.push("backend:start");
    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        uri: uri.clone(),
        headers,
        body: body.clone(),
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.events.push("backend:done");

    let text = format!("{method} {uri} {}", String::from_utf8_lossy(&body));
    (
        StatusCode::CREATED,
        [("x-served-by", "mock-backend"), ("content-type", "text/plain")],
        text,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Authorization service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum AuthMode {
    Allow,
    Deny,
    /// 200 with a body that is not a decision.
    Malformed,
    /// 500 with a plain-text body.
    Failing,
    /// Allow, after the given delay.
    Slow(Duration),
}

#[derive(Clone)]
struct AuthState {
    mode: AuthMode,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockAuthorizer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockAuthorizer {
    pub async fn start(mode: AuthMode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/auth/is-access-allowed", post(auth_handler))
            .with_state(AuthState {
                mode,
                requests: requests.clone(),
            });
        Self {
            addr: serve(app).await,
            requests,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn auth_handler(
    State(state): State<AuthState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method,
        uri,
        headers,
        body,
    });

    match state.mode {
        AuthMode::Allow => axum::Json(serde_json::json!({"ok": true})).into_response(),
        AuthMode::Deny => axum::Json(serde_json::json!({"ok": false})).into_response(),
        AuthMode::Malformed => "Permission granted".into_response(),
        AuthMode::Failing => (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response(),
        AuthMode::Slow(delay) => {
            tokio::time::sleep(delay).await;
            axum::Json(serde_json::json!({"ok": true})).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Registry, notifier, span reporter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingRegistry {
    pub events: EventLog,
    pub registrations: Mutex<Vec<ServiceRegistration>>,
    pub deregistrations: Mutex<Vec<Uuid>>,
    pub fail_register: bool,
    pub fail_deregister: bool,
    /// When set, `register` blocks until notified.
    pub hold_register: Option<Arc<Notify>>,
}

impl RecordingRegistry {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ServiceRegistry for RecordingRegistry {
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        if let Some(hold) = &self.hold_register {
            hold.notified().await;
        }
        if self.fail_register {
            self.events.push("register:failed");
            return Err(RegistryError::Rejected {
                status: 500,
                body: "agent unavailable".to_string(),
            });
        }
        self.registrations.lock().unwrap().push(registration.clone());
        self.events.push("register");
        Ok(())
    }

    async fn deregister(&self, instance_id: &Uuid) -> Result<(), RegistryError> {
        self.deregistrations.lock().unwrap().push(*instance_id);
        self.events.push("deregister");
        if self.fail_deregister {
            return Err(RegistryError::Rejected {
                status: 500,
                body: "agent unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: EventLog,
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _level: Level, message: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(message.to_string());
        self.events.push(format!("notify:{message}"));
        if self.fail {
            return Err(NotifyError::Rejected(503));
        }
        Ok(())
    }
}

/// Keeps finished spans; logs `spans:flushed` on shutdown.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: EventLog,
    spans: Mutex<Vec<FinishedSpan>>,
}

impl RecordingReporter {
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().unwrap().clone()
    }
}

impl SpanReporter for RecordingReporter {
    fn report(&self, span: FinishedSpan) {
        self.spans.lock().unwrap().push(span);
    }

    fn shutdown(&self) {
        self.events.push("spans:flushed");
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub fn service(backend: SocketAddr, endpoints: &[(&str, &str)]) -> ServiceConfig {
    ServiceConfig {
        addr: backend.to_string(),
        endpoints: endpoints
            .iter()
            .map(|(method, uri)| EndpointConfig {
                uri: uri.to_string(),
                method: method.to_string(),
            })
            .collect(),
    }
}

/// Config on an ephemeral port, talking to `authorizer`.
pub fn gateway_config(authorizer: &str, services: Vec<ServiceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.addr = "127.0.0.1:0".to_string();
    config.permission_addr = authorizer.to_string();
    config.services = services;
    config.authorization.timeout_secs = 1;
    config.timeouts.upstream_secs = 2;
    config
}

pub struct Doubles {
    pub events: EventLog,
    pub registry: Arc<RecordingRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub spans: Arc<RecordingReporter>,
}

impl Doubles {
    pub fn new() -> Self {
        let events = EventLog::default();
        Self::with_registry(RecordingRegistry::new(events.clone()), events)
    }

    pub fn with_registry(registry: RecordingRegistry, events: EventLog) -> Self {
        Self {
            registry: Arc::new(registry),
            notifier: Arc::new(RecordingNotifier {
                events: events.clone(),
                ..RecordingNotifier::default()
            }),
            spans: Arc::new(RecordingReporter {
                events: events.clone(),
                ..RecordingReporter::default()
            }),
            events,
        }
    }

    pub fn dependencies(&self) -> Dependencies {
        Dependencies {
            registry: self.registry.clone(),
            notifier: self.notifier.clone(),
            tracer: Tracer::new("gateway", true, self.spans.clone()),
        }
    }
}

pub struct TestGateway {
    pub handle: GatewayHandle,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<(), GatewayError>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), GatewayError> {
        self.handle.shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked")
    }
}

/// Run a gateway and wait until it is serving.
pub async fn start_gateway(config: GatewayConfig, deps: Dependencies) -> TestGateway {
    let gateway = Gateway::with_dependencies(config, deps);
    let handle = gateway.handle();
    let task = tokio::spawn(gateway.run());

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        handle.wait_for_state(|s| s == LifecycleState::Serving || s.is_terminal()),
    )
    .await
    .expect("gateway did not start");
    assert_eq!(state, LifecycleState::Serving);

    let addr = handle.local_addr().expect("listener bound");
    TestGateway { handle, addr, task }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
