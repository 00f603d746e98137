//! Response handling and transformation.
//!
//! # Responsibilities
//! - Render gateway-generated errors as JSON `{"message": ...}` bodies
//! - Keep a span open for as long as a streamed body is in flight
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - A span attached to a body ends when the body ends, errors, or is dropped

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body::{Body, Frame, SizeHint};
use serde_json::json;

use crate::observability::Span;

/// A JSON error response: `{"message": "<message>"}`.
pub fn json_error(status: StatusCode, message: impl fmt::Display) -> Response {
    (status, Json(json!({ "message": message.to_string() }))).into_response()
}

/// Body wrapper that finishes a span once the wrapped body is done.
pub struct TracedBody<B> {
    inner: B,
    span: Option<Span>,
}

impl<B> TracedBody<B> {
    pub fn new(inner: B, span: Span) -> Self {
        Self {
            inner,
            span: Some(span),
        }
    }
}

impl<B> Body for TracedBody<B>
where
    B: Body + Unpin,
    B::Error: fmt::Display,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(None) => {
                if let Some(span) = this.span.take() {
                    span.finish();
                }
            }
            Poll::Ready(Some(Err(e))) => {
                if let Some(mut span) = this.span.take() {
                    span.set_tag("error", true);
                    span.set_tag("error.message", e);
                    span.finish();
                }
            }
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                if let Some(span) = this.span.take() {
                    span.finish();
                }
            }
            _ => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
