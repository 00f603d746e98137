//! Inbound trace context.
//!
//! Starts the server span for every request, continuing the caller's trace
//! when a valid `traceparent` is present. The span's context is stored in
//! the request extensions for the gate and the proxy to parent their client
//! spans on.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::request::request_uri;
use crate::http::response::TracedBody;
use crate::observability::{SpanKind, Tracer};

pub async fn trace_context_middleware(
    State(tracer): State<Tracer>,
    mut request: Request,
    next: Next,
) -> Response {
    let parent = tracer.extract(request.headers());
    let mut span = tracer.start_span(
        format!("HTTP {}", request.method()),
        parent.as_ref(),
        SpanKind::Server,
    );
    span.set_tag("http.url", request_uri(&request));
    request.extensions_mut().insert(*span.context());

    let response = next.run(request).await;
    span.set_tag("http.status_code", response.status().as_u16());

    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(TracedBody::new(body, span)))
}
