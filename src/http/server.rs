//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: health check, proxy fallback, middleware
//! - Configure HTTP/1.1 and HTTP/2 support
//! - Run the accept loop until shutdown is signalled
//! - Hand accepted connections to the connection tracker for draining

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use hyper_util::{rt::TokioExecutor, server::conn::auto};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::AuthorizationClient;
use crate::config::{CorsConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::http::middleware::{authorization_middleware, trace_context_middleware};
use crate::http::proxy::{proxy_handler, Forwarder};
use crate::http::HEALTH_CHECK_PATH;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::Tracer;
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub authorizer: Arc<AuthorizationClient>,
    pub forwarder: Forwarder,
    pub tracer: Tracer,
}

impl AppState {
    /// Build the route table and outbound clients from configuration.
    pub fn new(config: &GatewayConfig, tracer: Tracer) -> Result<Self, GatewayError> {
        let routes = RouteTable::build(&config.services)?;

        let authorizer = AuthorizationClient::new(
            &config.permission_addr,
            config.authorization.timeout(),
            tracer.clone(),
        )?;
        let forwarder = Forwarder::new(tracer.clone(), config.timeouts.upstream());

        Ok(Self {
            routes: Arc::new(routes),
            authorizer: Arc::new(authorizer),
            forwarder,
            tracer,
        })
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let authorizer = state.authorizer.clone();
    let tracer = state.tracer.clone();

    // Last added runs first.
    let router = Router::new()
        .route(HEALTH_CHECK_PATH, get(health_check))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(from_fn_with_state(authorizer, authorization_middleware))
        .layer(from_fn_with_state(tracer, trace_context_middleware))
        .layer(RequestBodyLimitLayer::new(config.max_body_size));

    let router = if config.cors.enabled {
        router.layer(cors_layer(&config.cors))
    } else {
        router
    };

    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn health_check() -> Json<Value> {
    Json(json!({}))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let methods: Vec<Method> = config
        .allow_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect();
    let headers: Vec<HeaderName> = config
        .allow_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(methods)
        .allow_headers(headers)
}

/// Accept loop result: the connections still to be drained, and why the
/// loop ended.
pub struct Stopped {
    pub connections: ConnectionTracker,
    pub outcome: Result<(), ListenerError>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    listener: Listener,
    router: Router,
}

impl HttpServer {
    pub fn new(listener: Listener, router: Router) -> Self {
        Self { listener, router }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires or the listener fails.
    ///
    /// The listener is closed on return; connections already accepted keep
    /// running and are handed back for draining.
    pub async fn serve(self, mut shutdown: ShutdownSignal) -> Stopped {
        let Self { mut listener, router } = self;
        let builder = auto::Builder::new(TokioExecutor::new());
        let mut connections = ConnectionTracker::new();

        tracing::info!(address = ?listener.local_addr().ok(), "HTTP server accepting connections");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok(Some((stream, peer, permit))) => {
                        connections.serve(&builder, stream, peer, permit, router.clone());
                    }
                    Ok(None) => {}
                    Err(e) => break Err(e),
                },
            }
            connections.reap();
        };
        drop(listener);

        tracing::info!(
            active_connections = connections.active_count(),
            "Stopped accepting connections"
        );
        Stopped {
            connections,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, ServiceConfig};
    use crate::observability::LogReporter;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(cors: bool) -> Router {
        let mut config = GatewayConfig::default();
        // Nothing listens on port 1.
        config.permission_addr = "http://127.0.0.1:1".to_string();
        config.cors.enabled = cors;
        config.services.push(ServiceConfig {
            addr: "127.0.0.1:1".to_string(),
            endpoints: vec![EndpointConfig {
                uri: "/widgets".to_string(),
                method: "GET".to_string(),
            }],
        });
        let tracer = Tracer::new("test", true, Arc::new(LogReporter));
        let state = AppState::new(&config, tracer).unwrap();
        build_router(&config, state)
    }

    #[tokio::test]
    async fn health_check_skips_authorization() {
        let response = app(true)
            .oneshot(Request::get("/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn unreachable_authorizer_fails_closed() {
        let response = app(true)
            .oneshot(Request::get("/widgets").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_slice(
            &axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn cors_preflight_answered_before_gate() {
        let preflight = || {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/widgets")
                .header("origin", "https://app.example.com")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let response = app(true).oneshot(preflight()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("PUT") && methods.contains("POST"));

        let response = app(false).oneshot(preflight()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let mut config = GatewayConfig::default();
        config.max_body_size = 8;
        let tracer = Tracer::new("test", true, Arc::new(LogReporter));
        let state = AppState::new(&config, tracer).unwrap();

        let response = build_router(&config, state)
            .oneshot(
                Request::post("/widgets")
                    .header("content-length", "32")
                    .body(Body::from(vec![b'x'; 32]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
