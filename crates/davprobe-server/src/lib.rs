//! In-process WebDAV server-under-test for conformance runs.
//!
//! This crate assembles a WebDAV server from the dav-server crate and
//! manages its lifetime next to a test driver running in the same process.
//!
//! # How It Works
//!
//! 1. The harness provisions a resource root directory
//! 2. [`ServerLifecycle::start`] binds (ephemeral port by default), spawns the
//!    accept loop and blocks until the listener accepts connections
//! 3. The driver talks HTTP to the reported address
//! 4. [`ServerLifecycle::stop`] stops accepting, drains in-flight requests
//!    within a grace period, then joins the server task
//!
//! The server itself is an external collaborator: `LocalFs` provides
//! resources, `MemLs` provides locking, and a thin overlay stores dead
//! properties so PROPPATCH/PROPFIND round-trips work.
//!
//! # Example
//!
//! ```ignore
//! use davprobe_server::{ServerConfig, ServerLifecycle};
//!
//! let root = tempfile::TempDir::new()?;
//! let mut server = ServerLifecycle::new(root.path());
//! let addr = server.start(&ServerConfig::default()).await?;
//! println!("Serving on http://{addr}");
//! // ... drive requests ...
//! server.stop().await?;
//! ```
//!
//! # Security
//!
//! By default, the server binds to localhost (127.0.0.1) only.
//! Basic authentication is enforced only when credentials are configured.

mod config;
mod error;
mod filesystem;
mod lifecycle;
mod service;

// Public exports
pub use config::{
    Credentials, DEFAULT_BIND_ATTEMPTS, DEFAULT_GRACE_PERIOD, DEFAULT_READINESS_TIMEOUT,
    ServerConfig,
};
pub use error::{LifecycleError, LifecycleResult};
pub use filesystem::DeadPropFs;
pub use lifecycle::{ServerLifecycle, ServerState, StopOutcome};
