//! Gateway lifecycle controller.
//!
//! # Responsibilities
//! - Build routes and bind the listener before anything is announced
//! - Register with the service registry before the first accept
//! - Serve until a termination trigger or a listener failure
//! - Stop accepting, deregister, then drain in-flight requests with a deadline
//!
//! # Design Decisions
//! - `run` consumes the controller, so a gateway runs at most once
//! - Shutdown triggers are idempotent and may arrive at any point
//! - Failures after registration never skip deregistration

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::{build_router, AppState, HttpServer, Stopped};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::net::Listener;
use crate::notify::{self, Level, Notifier};
use crate::observability::Tracer;
use crate::registry::{ConsulRegistry, ServiceRegistration, ServiceRegistry};

/// External collaborators of the gateway.
#[derive(Clone)]
pub struct Dependencies {
    pub registry: Arc<dyn ServiceRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub tracer: Tracer,
}

impl Dependencies {
    /// Consul registry, configured notifier, tracer exporting to the
    /// configured agent.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            registry: Arc::new(ConsulRegistry::new(&config.registry.addr)?),
            notifier: notify::from_config(&config.notifier)?,
            tracer: Tracer::from_config(&config.tracing)?,
        })
    }
}

/// A gateway instance, ready to run.
pub struct Gateway {
    config: GatewayConfig,
    instance_id: Uuid,
    deps: Dependencies,
    state: StateCell,
    shutdown: Shutdown,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let deps = Dependencies::from_config(&config)?;
        Ok(Self::with_dependencies(config, deps))
    }

    pub fn with_dependencies(config: GatewayConfig, deps: Dependencies) -> Self {
        Self {
            config,
            instance_id: Uuid::new_v4(),
            deps,
            state: StateCell::new(),
            shutdown: Shutdown::new(),
            local_addr: Arc::new(OnceLock::new()),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Handle for triggering shutdown and observing progress from other tasks.
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            instance_id: self.instance_id,
            state: self.state.clone(),
            shutdown: self.shutdown.clone(),
            local_addr: Arc::clone(&self.local_addr),
        }
    }

    /// Run the gateway to completion.
    ///
    /// Returns the first fatal error, else the deregistration error, else the
    /// drain error, else a failed stop notification.
    pub async fn run(self) -> Result<(), GatewayError> {
        let Self {
            config,
            instance_id,
            deps,
            state,
            shutdown,
            local_addr,
        } = self;

        state.advance(LifecycleState::Initializing)?;
        info!(instance_id = %instance_id, "Gateway starting");

        let server = match initialize(&config, &deps.tracer).await {
            Ok(server) => server,
            Err(e) => return abort(&state, e),
        };
        if let Ok(addr) = server.local_addr() {
            let _ = local_addr.set(addr);
        }

        let registration = match ServiceRegistration::from_config(instance_id, &config.registry) {
            Ok(registration) => registration,
            Err(e) => return abort(&state, e.into()),
        };
        if let Err(e) = deps.registry.register(&registration).await {
            return abort(&state, e.into());
        }
        state.advance(LifecycleState::Registered)?;

        let mut serve_task = tokio::spawn(server.serve(shutdown.subscribe()));
        state.advance(LifecycleState::Serving)?;

        let service = config.registry.service_family_name.as_str();
        let mut fatal: Option<GatewayError> = None;
        if let Err(e) = deps
            .notifier
            .send(Level::Info, &notify::launched_message(service, &instance_id))
            .await
        {
            error!(error = %e, "Launch notification failed, shutting down");
            fatal = Some(e.into());
        }

        let finished_early = if fatal.is_none() {
            let mut signal = shutdown.subscribe();
            tokio::select! {
                _ = signal.recv() => None,
                joined = &mut serve_task => Some(joined),
            }
        } else {
            None
        };

        state.advance(LifecycleState::Draining)?;
        shutdown.trigger();

        let joined = match finished_early {
            Some(joined) => joined,
            None => serve_task.await,
        };
        let stopped = match joined {
            Ok(stopped) => Some(stopped),
            Err(e) => {
                error!(error = %e, "Server task failed");
                fatal.get_or_insert(e.into());
                None
            }
        };

        let mut deregister_error: Option<GatewayError> = None;
        if let Err(e) = deps.registry.deregister(&instance_id).await {
            error!(error = %e, "Deregistration failed");
            deregister_error = Some(e.into());
        }

        let mut drain_error: Option<GatewayError> = None;
        if let Some(Stopped {
            connections,
            outcome,
        }) = stopped
        {
            if let Err(e) = outcome {
                error!(error = %e, "Listener failed");
                fatal.get_or_insert(e.into());
            }
            if let Err(e) = connections.drain(config.shutdown_timeout()).await {
                drain_error = Some(e.into());
            }
        }

        deps.tracer.shutdown().await;
        state.advance(LifecycleState::Stopped)?;

        let mut notify_error: Option<GatewayError> = None;
        if let Err(e) = deps
            .notifier
            .send(Level::Info, &notify::stopped_message(service, &instance_id))
            .await
        {
            error!(error = %e, "Stop notification failed");
            notify_error = Some(e.into());
        }

        match fatal.or(deregister_error).or(drain_error).or(notify_error) {
            Some(e) => Err(e),
            None => {
                info!(instance_id = %instance_id, "Gateway stopped");
                Ok(())
            }
        }
    }
}

async fn initialize(config: &GatewayConfig, tracer: &Tracer) -> Result<HttpServer, GatewayError> {
    let app_state = AppState::new(config, tracer.clone())?;
    let router = build_router(config, app_state);
    let listener = Listener::bind(&config.addr, config.listener.max_connections).await?;
    Ok(HttpServer::new(listener, router))
}

fn abort(state: &StateCell, error: GatewayError) -> Result<(), GatewayError> {
    error!(error = %error, "Gateway startup failed");
    if let Err(e) = state.advance(LifecycleState::Aborted) {
        warn!(error = %e, "Could not mark gateway aborted");
    }
    Err(error)
}

/// Cloneable control surface for a running [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    instance_id: Uuid,
    state: StateCell,
    shutdown: Shutdown,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl GatewayHandle {
    /// Request graceful shutdown. Safe to call any number of times, from
    /// any state.
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            info!(instance_id = %self.instance_id, "Shutdown requested");
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn state(&self) -> LifecycleState {
        self.state.current()
    }

    /// Wait until the state satisfies `predicate`, returning that state.
    pub async fn wait_for_state(&self, mut predicate: impl FnMut(LifecycleState) -> bool) -> LifecycleState {
        let mut rx = self.state.subscribe();
        let reached = rx.wait_for(|state| predicate(*state)).await.map(|state| *state);
        reached.unwrap_or_else(|_| self.state.current())
    }

    /// Address the listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use crate::observability::LogReporter;
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl ServiceRegistry for Calls {
        async fn register(&self, _: &ServiceRegistration) -> Result<(), RegistryError> {
            self.0.lock().unwrap().push("register");
            Ok(())
        }

        async fn deregister(&self, _: &Uuid) -> Result<(), RegistryError> {
            self.0.lock().unwrap().push("deregister");
            Ok(())
        }
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.addr = "127.0.0.1:0".to_string();
        config
    }

    fn deps(registry: Arc<Calls>) -> Dependencies {
        Dependencies {
            registry,
            notifier: Arc::new(NoopNotifier),
            tracer: Tracer::new("test", true, Arc::new(LogReporter)),
        }
    }

    #[tokio::test]
    async fn shutdown_before_run_still_registers_and_deregisters() {
        let calls = Arc::new(Calls::default());
        let gateway = Gateway::with_dependencies(config(), deps(calls.clone()));
        let handle = gateway.handle();

        handle.shutdown();
        handle.shutdown();
        gateway.run().await.unwrap();

        assert_eq!(handle.state(), LifecycleState::Stopped);
        assert_eq!(*calls.0.lock().unwrap(), ["register", "deregister"]);
    }

    #[tokio::test]
    async fn bind_failure_aborts_without_registering() {
        let calls = Arc::new(Calls::default());
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = config();
        config.addr = taken.local_addr().unwrap().to_string();
        let gateway = Gateway::with_dependencies(config, deps(calls.clone()));
        let handle = gateway.handle();

        let err = gateway.run().await.unwrap_err();
        assert!(matches!(err, GatewayError::Listener(_)));
        assert_eq!(handle.state(), LifecycleState::Aborted);
        assert!(calls.0.lock().unwrap().is_empty());
    }
}
