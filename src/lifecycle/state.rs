//! Gateway lifecycle states.
//!
//! ```text
//! Created → Initializing → Registered → Serving → Draining → Stopped
//!                │              │
//!                └──────────────┴──→ Aborted
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    /// Building routes and binding the listener.
    Initializing,
    /// Registered with the service registry, not yet accepting.
    Registered,
    Serving,
    /// Deregistering and waiting for in-flight requests.
    Draining,
    Stopped,
    /// Startup failed; nothing was served.
    Aborted,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Created, Aborted)
                | (Initializing, Registered)
                | (Initializing, Aborted)
                | (Registered, Serving)
                | (Registered, Aborted)
                | (Serving, Draining)
                | (Draining, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Aborted)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Registered => "registered",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// The current lifecycle state, observable by any number of watchers.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Created);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `to` if that is a legal step from the current state.
    pub fn advance(&self, to: LifecycleState) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(to) {
                tracing::info!(from = %state, to = %to, "Lifecycle transition");
                *state = to;
                true
            } else {
                result = Err(LifecycleError::InvalidTransition { from: *state, to });
                false
            }
        });
        result
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
