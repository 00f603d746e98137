//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, classify accept errors)
//!     → connection.rs (per-connection task, graceful shutdown tracking)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Active → Draining → Closed (or Aborted at the drain deadline)
//! ```
//!
//! # Design Decisions
//! - A failed accept for one connection never stops the listener
//! - Each connection is tracked so shutdown can wait for it, then abort it

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionTracker, DrainError};
pub use listener::{Listener, ListenerError};
