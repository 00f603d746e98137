//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Build routes → Bind listener → Register → Accept → Notify
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Deregister → Drain (deadline) → Notify
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing is announced before the listener is bound,
//!   nothing is accepted before the registry knows the instance
//! - Ordered shutdown: the registry stops sending traffic before draining
//! - Shutdown has a deadline: connections still open are aborted

pub mod controller;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use controller::{Dependencies, Gateway, GatewayHandle};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{LifecycleError, LifecycleState, StateCell};
