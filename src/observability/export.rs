//! OTLP span export.
//!
//! Finished gateway spans are replayed into an OpenTelemetry SDK tracer
//! with their own trace and span ids and timestamps, then shipped by a
//! batch exporter over gRPC to any OTLP-capable backend (Jaeger, Tempo, an
//! OpenTelemetry collector).

use opentelemetry::trace::{
    Span as _, SpanBuilder, SpanContext as OtelSpanContext, SpanId, SpanKind as OtelSpanKind,
    TraceContextExt, TraceFlags, TraceId, TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Tracer as SdkTracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};

use crate::config::validation::base_url;
use crate::observability::tracing::{FinishedSpan, SpanKind, SpanReporter};

const INSTRUMENTATION_NAME: &str = "api-gateway";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid tracing agent address '{0}'")]
    InvalidAddress(String),
    #[error("failed to initialize OTLP exporter for {endpoint}: {reason}")]
    Init { endpoint: String, reason: String },
}

/// Reports sampled spans to an OTLP collector.
pub struct OtlpReporter {
    provider: TracerProvider,
    tracer: SdkTracer,
}

impl OtlpReporter {
    /// Connects lazily; an unreachable collector only shows up as failed
    /// exports.
    pub fn new(agent_addr: &str, service_name: &str) -> Result<Self, ExportError> {
        let endpoint = base_url(agent_addr)
            .map_err(|_| ExportError::InvalidAddress(agent_addr.to_string()))?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| ExportError::Init {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_resource(Resource::new([KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]))
            .build();
        let tracer = provider.tracer(INSTRUMENTATION_NAME);

        tracing::info!(endpoint = %endpoint, service_name, "OTLP span export enabled");
        Ok(Self { provider, tracer })
    }
}

impl SpanReporter for OtlpReporter {
    fn report(&self, span: FinishedSpan) {
        if !span.context.sampled {
            return;
        }
        let ended_at = span.started_at + span.duration;
        let (builder, parent) = span_builder(&span);
        let mut exported = self.tracer.build_with_context(builder, &parent);
        exported.end_with_timestamp(ended_at);
    }

    fn shutdown(&self) {
        match self.provider.shutdown() {
            Ok(()) => tracing::info!("Span exporter flushed"),
            Err(e) => tracing::warn!(error = %e, "Span exporter shutdown failed"),
        }
    }
}

/// The SDK span description of a finished span, and the remote parent it
/// hangs off (empty for a trace root).
fn span_builder(span: &FinishedSpan) -> (SpanBuilder, Context) {
    let trace_id = TraceId::from_bytes(span.context.trace_id.to_be_bytes());
    let attributes: Vec<KeyValue> = span
        .tags
        .iter()
        .filter(|(key, _)| *key != "span.kind")
        .map(|(key, value)| KeyValue::new(*key, value.clone()))
        .collect();

    let builder = SpanBuilder::from_name(span.operation.clone())
        .with_kind(match span.kind {
            SpanKind::Server => OtelSpanKind::Server,
            SpanKind::Client => OtelSpanKind::Client,
        })
        .with_trace_id(trace_id)
        .with_span_id(SpanId::from_bytes(span.context.span_id.to_be_bytes()))
        .with_start_time(span.started_at)
        .with_end_time(span.started_at + span.duration)
        .with_attributes(attributes);

    let parent = match span.parent_span_id {
        Some(parent_id) => Context::new().with_remote_span_context(OtelSpanContext::new(
            trace_id,
            SpanId::from_bytes(parent_id.to_be_bytes()),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )),
        None => Context::new(),
    };

    (builder, parent)
}
