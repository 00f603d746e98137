//! Forwarding proxy.
//!
//! # Responsibilities
//! - Resolve the route for an authorized request
//! - Forward it to the backend over a pooled HTTP/1.1 client
//! - Stream the backend response back under a client span
//!
//! # Design Decisions
//! - No retries: a failed attempt is reported to the client as-is
//! - The upstream timeout bounds the wait for response headers only;
//!   bodies stream for as long as the backend keeps sending

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::request::{request_uri, rewrite_for_backend, InvalidBackend};
use crate::http::response::{json_error, TracedBody};
use crate::http::server::AppState;
use crate::observability::{metrics, SpanContext, SpanKind, Tracer};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidBackend(#[from] InvalidBackend),

    #[error("backend {backend} unavailable: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("backend {backend} did not respond within {timeout:?}")]
    Timeout { backend: String, timeout: Duration },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::InvalidBackend(_) | ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        };
        json_error(status, self)
    }
}

/// Sends requests to backends.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    tracer: Tracer,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(tracer: Tracer, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            tracer,
            timeout,
        }
    }

    /// Forward `request` to `backend` and return the backend's response.
    ///
    /// The request's [`SpanContext`] extension, if present, becomes the
    /// parent of the client span. The span stays open until the response
    /// body has been fully streamed.
    pub async fn forward(&self, request: Request<Body>, backend: &str) -> Result<Response, ProxyError> {
        let parent = request.extensions().get::<SpanContext>().copied();
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let mut span = self
            .tracer
            .start_span(request_uri(&request), parent.as_ref(), SpanKind::Client);
        span.set_tag("peer.address", backend);
        span.set_tag("http.method", request.method());

        let mut request = match rewrite_for_backend(request, backend, client_ip) {
            Ok(request) => request,
            Err(e) => {
                span.set_tag("error", true);
                return Err(e.into());
            }
        };
        self.tracer.inject(span.context(), request.headers_mut());

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                span.set_tag("http.status_code", response.status().as_u16());
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(TracedBody::new(body, span))))
            }
            Ok(Err(source)) => {
                span.set_tag("error", true);
                span.set_tag("error.message", &source);
                Err(ProxyError::Upstream {
                    backend: backend.to_string(),
                    source,
                })
            }
            Err(_) => {
                span.set_tag("error", true);
                Err(ProxyError::Timeout {
                    backend: backend.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Fallback handler: every request that is not the health check lands here
/// after passing the authorization gate.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let Some(route) = state.routes.resolve(&method, request.uri().path()) else {
        tracing::debug!(method = %method, path = %request.uri().path(), "No route matched");
        metrics::record_request(method.as_str(), StatusCode::NOT_FOUND.as_u16(), "none", start);
        return json_error(StatusCode::NOT_FOUND, "not found");
    };
    let backend = route.backend.clone();

    tracing::debug!(
        method = %method,
        uri = %request.uri(),
        backend = %backend,
        "Forwarding request"
    );

    let response = match state.forwarder.forward(request, &backend).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(method = %method, backend = %backend, error = %e, "Upstream error");
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &backend, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogReporter;
    use std::sync::Arc;

    #[test]
    fn error_statuses() {
        let timeout = ProxyError::Timeout {
            backend: "svc-a:9000".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let invalid = ProxyError::from(InvalidBackend("bad backend".to_string()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        let forwarder = Forwarder::new(
            Tracer::new("test", true, Arc::new(LogReporter)),
            Duration::from_secs(2),
        );
        let request = Request::builder().uri("/widgets").body(Body::empty()).unwrap();

        let err = forwarder.forward(request, "127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { .. }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
