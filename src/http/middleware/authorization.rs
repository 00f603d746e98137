//! Authorization middleware.
//! Runs the gate before any route is resolved.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use crate::auth::{gate, AuthorizationClient, GateOutcome};
use crate::http::response::json_error;
use crate::observability::{metrics, SpanContext};

pub async fn authorization_middleware(
    State(client): State<Arc<AuthorizationClient>>,
    request: Request,
    next: Next,
) -> Response {
    let parent = request.extensions().get::<SpanContext>().copied();
    let outcome = gate::evaluate(
        &client,
        request.method(),
        request.uri(),
        request.headers(),
        parent,
    )
    .await;

    match outcome {
        GateOutcome::Bypass => {
            metrics::record_authorization("bypass");
            next.run(request).await
        }
        GateOutcome::Allowed => {
            metrics::record_authorization("allowed");
            debug!(method = %request.method(), uri = %request.uri(), "Request authorized");
            next.run(request).await
        }
        GateOutcome::Denied => {
            metrics::record_authorization("denied");
            info!(method = %request.method(), uri = %request.uri(), "Permission denied");
            json_error(StatusCode::UNAUTHORIZED, "Permission denied")
        }
        GateOutcome::UpstreamError(e) => {
            metrics::record_authorization("error");
            warn!(method = %request.method(), uri = %request.uri(), error = %e, "Authorization service call failed");
            json_error(StatusCode::UNAUTHORIZED, e)
        }
    }
}
