//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Run each accepted connection on its own task
//! - Generate unique connection IDs for tracing
//! - Coordinate graceful shutdown per-connection
//! - Abort whatever is still running when the drain deadline passes

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tower::ServiceExt;

use crate::net::listener::ConnectionPermit;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("{remaining} connection(s) still open after {deadline:?}, aborted")]
    DeadlineExceeded { remaining: u64, deadline: Duration },
}

/// Owns every connection task accepted by the server.
pub struct ConnectionTracker {
    tasks: JoinSet<()>,
    graceful: GracefulShutdown,
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            graceful: GracefulShutdown::new(),
            active_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve one connection on a new task.
    ///
    /// The peer address is attached to every request as
    /// `ConnectInfo<SocketAddr>`. `permit` is released when the task ends.
    pub fn serve(
        &mut self,
        builder: &Builder<TokioExecutor>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        router: Router,
    ) {
        let guard = self.track();
        let service = TowerToHyperService::new(router.map_request(
            move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                request
            },
        ));

        let connection = builder
            .serve_connection(TokioIo::new(stream), service)
            .into_owned();
        let connection = self.graceful.watch(connection);

        self.tasks.spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, error = %e, "Connection error");
            }
            drop(guard);
            drop(permit);
        });
    }

    /// Collect tasks of connections that already closed.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!(error = %e, "Connection task panicked");
                }
            }
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Ask every connection to finish its in-flight requests and close,
    /// waiting at most `deadline`. Connections still open at the deadline
    /// are aborted.
    pub async fn drain(self, deadline: Duration) -> Result<(), DrainError> {
        let Self {
            mut tasks,
            graceful,
            active_count,
        } = self;

        tracing::info!(
            active_connections = active_count.load(Ordering::SeqCst),
            deadline = ?deadline,
            "Draining connections"
        );

        let drained = tokio::time::timeout(deadline, async {
            graceful.shutdown().await;
            while tasks.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => {
                tracing::info!("All connections drained");
                Ok(())
            }
            Err(_) => {
                let remaining = active_count.load(Ordering::SeqCst);
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                tracing::warn!(remaining, "Drain deadline exceeded, connections aborted");
                Err(DrainError::DeadlineExceeded {
                    remaining,
                    deadline,
                })
            }
        }
    }

    fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, "Connection opened");
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id,
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active count when the connection task ends, including
/// when it is aborted.
#[derive(Debug)]
struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn guards_track_active_count() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn empty_tracker_drains_immediately() {
        let tracker = ConnectionTracker::new();
        tracker.drain(Duration::from_millis(50)).await.unwrap();
    }
}
