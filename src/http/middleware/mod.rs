//! Gateway middleware.
//!
//! Applied around every route, outermost first:
//! ```text
//! trace_context (server span, SpanContext extension)
//!     → authorization (gate, 401 on deny or upstream error)
//!     → health check | proxy fallback
//! ```

pub mod authorization;
pub mod trace_context;

pub use authorization::authorization_middleware;
pub use trace_context::trace_context_middleware;
