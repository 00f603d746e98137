//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path templates)
//!     → Return: matched RouteEntry or NoMatch
//!
//! Route Compilation (at startup):
//!     ServiceConfig[]
//!     → Parse verbs (closed set) and path templates
//!     → Last duplicate (method, path) wins
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Unknown verbs are configuration errors, never ignored
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{PathPattern, PatternError};
pub use router::{HttpVerb, RouteEntry, RouteError, RouteTable};
