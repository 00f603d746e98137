//! TCP listener with connection limiting.
//!
//! # Responsibilities
//! - Bind to the configured address before the instance registers
//! - Accept incoming TCP connections
//! - Enforce maximum concurrent connection limit (backpressure)
//! - Ride out per-connection and resource-exhaustion accept failures
//!
//! # Design Decisions
//! - Semaphore-based limiting: excess connections wait in the kernel backlog
//! - Running out of descriptors or buffers is temporary; the accept loop
//!   backs off (5ms doubling up to 1s) and keeps going

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("connection limit closed")]
    LimitClosed,
}

/// A bound TCP listener.
///
/// Binding does not start serving: connections queue in the kernel backlog
/// until the accept loop runs.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    backoff: Option<Duration>,
}

impl Listener {
    pub async fn bind(addr: &str, max_connections: usize) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        tracing::info!(
            address = ?inner.local_addr().ok(),
            max_connections,
            "Listener bound"
        );
        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            backoff: None,
        })
    }

    /// Accept the next connection, waiting for a free slot first.
    ///
    /// `Ok(None)` means nothing was handed over this time (a connection
    /// failed during accept, or the process is short of resources and the
    /// call backed off) and the listener is still usable. The permit must be
    /// held for the connection's lifetime.
    pub async fn accept(
        &mut self,
    ) -> Result<Option<(TcpStream, SocketAddr, ConnectionPermit)>, ListenerError> {
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::LimitClosed)?;

        match self.inner.accept().await {
            Ok((stream, peer)) => {
                self.backoff = None;
                tracing::debug!(
                    peer_addr = %peer,
                    available_permits = self.connection_limit.available_permits(),
                    "Connection accepted"
                );
                Ok(Some((stream, peer, ConnectionPermit { _permit: permit })))
            }
            Err(e) if is_connection_error(&e) => {
                tracing::debug!(error = %e, "Connection failed during accept");
                Ok(None)
            }
            Err(e) if is_resource_exhaustion(&e) => {
                drop(permit);
                let delay = next_backoff(self.backoff);
                self.backoff = Some(delay);
                tracing::warn!(error = %e, retry_in = ?delay, "Accept failed, out of resources");
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Err(e) => Err(ListenerError::Accept(e)),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot. Released when dropped, including when the connection
/// task is aborted.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

// ENOMEM, ENFILE, EMFILE, ENOBUFS
#[cfg(target_os = "linux")]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[12, 23, 24, 105];
#[cfg(all(unix, not(target_os = "linux")))]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[12, 23, 24, 55];
// WSAEMFILE, WSAENOBUFS
#[cfg(windows)]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[10024, 10055];
#[cfg(not(any(unix, windows)))]
const RESOURCE_EXHAUSTION_CODES: &[i32] = &[];

fn is_resource_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory
        || e
            .raw_os_error()
            .is_some_and(|code| RESOURCE_EXHAUSTION_CODES.contains(&code))
}

fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => MIN_ACCEPT_BACKOFF,
        Some(delay) => (delay * 2).min(MAX_ACCEPT_BACKOFF),
    }
}
