//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (spans propagated via traceparent)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Span reporter (OTLP collector, or log events when none is set)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request ID and trace context flow through every hop
//! - Metrics are cheap (atomic increments)

pub mod export;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use export::{ExportError, OtlpReporter};
pub use self::tracing::{
    FinishedSpan, LogReporter, Span, SpanContext, SpanKind, SpanReporter, Tracer,
};
