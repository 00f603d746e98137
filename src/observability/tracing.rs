//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Propagate trace context to the authorization service and backends
//! - Create spans for gateway operations and report them when finished
//!
//! # Design Decisions
//! - The tracer is a handle passed explicitly to the components that need
//!   it, never a process global
//! - Supports W3C Trace Context headers (`traceparent`)
//! - Export is behind the `SpanReporter` trait. Spans go to an OTLP
//!   collector when `tracing.agent_addr` is set, otherwise one structured log
//!   event per finished span

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use axum::http::{HeaderMap, HeaderValue};

use crate::config::TracingConfig;
use crate::observability::export::{ExportError, OtlpReporter};

/// W3C Trace Context header name.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Identity of a span as carried across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: u128,
    pub span_id: u64,
    pub sampled: bool,
}

impl SpanContext {
    /// Parse a `traceparent` header value.
    ///
    /// Format: version-trace_id-parent_id-flags, e.g.
    /// `00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
    pub fn parse_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, span_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || version != "00" {
            return None;
        }
        if trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }

        let trace_id = u128::from_str_radix(trace_id, 16).ok()?;
        let span_id = u64::from_str_radix(span_id, 16).ok()?;
        let flags = u8::from_str_radix(flags, 16).ok()?;
        if trace_id == 0 || span_id == 0 {
            return None;
        }

        Some(Self {
            trace_id,
            span_id,
            sampled: flags & 0x01 == 1,
        })
    }

    /// Render as a `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{:032x}-{:016x}-{}", self.trace_id, self.span_id, flags)
    }

    fn root(sampled: bool) -> Self {
        Self {
            trace_id: loop {
                let id: u128 = rand::random();
                if id != 0 {
                    break id;
                }
            },
            span_id: new_span_id(),
            sampled,
        }
    }

    fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: new_span_id(),
            sampled: self.sampled,
        }
    }
}

fn new_span_id() -> u64 {
    loop {
        let id: u64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Handling an inbound request.
    Server,
    /// An outbound call made on behalf of a request.
    Client,
}

impl SpanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanKind::Server => "server",
            SpanKind::Client => "client",
        }
    }
}

/// A span that has ended.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub service: Arc<str>,
    pub operation: String,
    pub context: SpanContext,
    pub parent_span_id: Option<u64>,
    pub kind: SpanKind,
    pub started_at: SystemTime,
    pub duration: Duration,
    pub tags: Vec<(&'static str, String)>,
}

impl FinishedSpan {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Destination for finished spans.
pub trait SpanReporter: Send + Sync {
    fn report(&self, span: FinishedSpan);

    /// Flush buffered spans. May block.
    fn shutdown(&self) {}
}

/// Reports sampled spans as structured log events.
#[derive(Debug, Default)]
pub struct LogReporter;

impl SpanReporter for LogReporter {
    fn report(&self, span: FinishedSpan) {
        if !span.context.sampled {
            return;
        }
        tracing::debug!(
            target: "gateway::spans",
            service = %span.service,
            operation = %span.operation,
            kind = span.kind.as_str(),
            trace_id = %format!("{:032x}", span.context.trace_id),
            span_id = %format!("{:016x}", span.context.span_id),
            parent_span_id = ?span.parent_span_id.map(|id| format!("{id:016x}")),
            duration_ms = span.duration.as_secs_f64() * 1000.0,
            tags = ?span.tags,
            "Span finished"
        );
    }
}

/// Tracing handle shared by the authorization gate and the forwarding proxy.
#[derive(Clone)]
pub struct Tracer {
    service_name: Arc<str>,
    sample_roots: bool,
    reporter: Arc<dyn SpanReporter>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("service_name", &self.service_name)
            .field("sample_roots", &self.sample_roots)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    pub fn new(service_name: impl Into<Arc<str>>, sample_roots: bool, reporter: Arc<dyn SpanReporter>) -> Self {
        Self {
            service_name: service_name.into(),
            sample_roots,
            reporter,
        }
    }

    /// Tracer exporting to `agent_addr` when set, else reporting through
    /// the log. Must be called within a Tokio runtime.
    pub fn from_config(config: &TracingConfig) -> Result<Self, ExportError> {
        let reporter: Arc<dyn SpanReporter> = match &config.agent_addr {
            Some(addr) => Arc::new(OtlpReporter::new(addr, &config.service_name)?),
            None => Arc::new(LogReporter),
        };
        Ok(Self::new(config.service_name.as_str(), config.sample_roots, reporter))
    }

    /// Flush and stop the span reporter. Spans finished afterwards may be
    /// lost.
    pub async fn shutdown(&self) {
        let reporter = Arc::clone(&self.reporter);
        if let Err(e) = tokio::task::spawn_blocking(move || reporter.shutdown()).await {
            tracing::warn!(error = %e, "Span reporter shutdown failed");
        }
    }

    /// Read the trace context carried by a request, if any.
    pub fn extract(&self, headers: &HeaderMap) -> Option<SpanContext> {
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(SpanContext::parse_traceparent)
    }

    /// Write a trace context into outbound headers, replacing any previous one.
    pub fn inject(&self, context: &SpanContext, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&context.to_traceparent()) {
            headers.insert(TRACEPARENT_HEADER, value);
        }
    }

    /// Start a span, as a child of `parent` or as a new trace root.
    pub fn start_span(
        &self,
        operation: impl Into<String>,
        parent: Option<&SpanContext>,
        kind: SpanKind,
    ) -> Span {
        let context = match parent {
            Some(parent) => parent.child(),
            None => SpanContext::root(self.sample_roots),
        };

        Span {
            tracer: self.clone(),
            operation: operation.into(),
            context,
            parent_span_id: parent.map(|p| p.span_id),
            kind,
            started: Instant::now(),
            started_at: SystemTime::now(),
            tags: vec![("span.kind", kind.as_str().to_string())],
            finished: false,
        }
    }
}

/// An in-progress span. Reported once, on `finish` or drop.
pub struct Span {
    tracer: Tracer,
    operation: String,
    context: SpanContext,
    parent_span_id: Option<u64>,
    kind: SpanKind,
    started: Instant,
    started_at: SystemTime,
    tags: Vec<(&'static str, String)>,
    finished: bool,
}

impl Span {
    pub fn context(&self) -> &SpanContext {
        &self.context
    }

    pub fn set_tag(&mut self, key: &'static str, value: impl ToString) {
        self.tags.push((key, value.to_string()));
    }

    pub fn finish(mut self) {
        self.report();
    }

    fn report(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.tracer.reporter.report(FinishedSpan {
            service: self.tracer.service_name.clone(),
            operation: std::mem::take(&mut self.operation),
            context: self.context,
            parent_span_id: self.parent_span_id,
            kind: self.kind,
            started_at: self.started_at,
            duration: self.started.elapsed(),
            tags: std::mem::take(&mut self.tags),
        });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.report();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("operation", &self.operation)
            .field("context", &self.context)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<FinishedSpan>>);

    impl SpanReporter for Recorder {
        fn report(&self, span: FinishedSpan) {
            self.0.lock().unwrap().push(span);
        }
    }

    #[test]
    fn traceparent_round_trip() {
        let raw = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let ctx = SpanContext::parse_traceparent(raw).unwrap();
        assert_eq!(ctx.trace_id, 0x0af7651916cd43dd8448eb211c80319c);
        assert_eq!(ctx.span_id, 0xb7ad6b7169203331);
        assert!(ctx.sampled);
        assert_eq!(ctx.to_traceparent(), raw);
    }

    #[test]
    fn rejects_malformed_traceparent() {
        for raw in [
            "",
            "01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331",
            "00-00000000000000000000000000000000-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",
            "00-xyz7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-extra",
        ] {
            assert!(SpanContext::parse_traceparent(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn child_span_keeps_trace_and_reports_once() {
        let recorder = Arc::new(Recorder::default());
        let tracer = Tracer::new("gateway", true, recorder.clone());

        let root = tracer.start_span("HTTP GET", None, SpanKind::Server);
        let root_ctx = *root.context();
        let mut child = tracer.start_span("/widgets", Some(&root_ctx), SpanKind::Client);
        child.set_tag("peer.address", "svc-a:9000");
        let child_ctx = *child.context();

        assert_eq!(child_ctx.trace_id, root_ctx.trace_id);
        assert_ne!(child_ctx.span_id, root_ctx.span_id);

        child.finish();
        drop(root);

        let spans = recorder.0.lock().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].operation, "/widgets");
        assert_eq!(spans[0].parent_span_id, Some(root_ctx.span_id));
        assert_eq!(spans[0].tag("span.kind"), Some("client"));
        assert_eq!(spans[0].tag("peer.address"), Some("svc-a:9000"));
        assert_eq!(spans[1].parent_span_id, None);
        assert_eq!(&*spans[1].service, "gateway");
    }

    #[test]
    fn inject_then_extract() {
        let tracer = Tracer::new("gateway", false, Arc::new(LogReporter));
        let span = tracer.start_span("op", None, SpanKind::Client);
        assert!(!span.context().sampled);

        let mut headers = HeaderMap::new();
        tracer.inject(span.context(), &mut headers);
        assert_eq!(tracer.extract(&headers), Some(*span.context()));
    }
}
