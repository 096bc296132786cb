//! Harness-level lifecycle errors.
//!
//! Every variant here is fatal to a scenario run: it means the
//! server-under-test could not be brought up or torn down cleanly.

use crate::lifecycle::ServerState;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors raised by [`ServerLifecycle`](crate::ServerLifecycle).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start()` was called while a server is starting or running.
    #[error("Server already active (state: {state})")]
    AlreadyRunning { state: ServerState },

    /// A state change that would move the lifecycle backwards.
    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: ServerState, to: ServerState },

    /// The resource provider root has not been provisioned.
    #[error("Resource root does not exist or is not a directory: {}", .0.display())]
    MissingRoot(PathBuf),

    /// The address could not be bound, even after retries.
    #[error("Failed to bind {addr} after {attempts} attempt(s): {source}")]
    Bind {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The listener never became observably ready.
    #[error("Server at {addr} failed to start: {reason}")]
    Startup { addr: SocketAddr, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server task panicked or was cancelled before it could be joined.
    #[error("Server task failed: {0}")]
    Join(#[from] JoinError),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
