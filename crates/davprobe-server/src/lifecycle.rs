//! Start/stop lifecycle for the server-under-test.
//!
//! The server runs as a background task next to the test driver. Startup
//! is a readiness barrier: `start()` returns only once the listener is
//! observably accepting connections. Shutdown stops accepting, drains
//! in-flight requests within a grace period and then joins the task.
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//!               \___________________________/
//!                    (failed start)
//! ```

use crate::config::ServerConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::service::DavApp;
use hyper::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Upper bound on a single readiness probe connect.
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);
const PROBE_INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const PROBE_MAX_BACKOFF: Duration = Duration::from_millis(100);

const BIND_INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Extra time granted to join the server task after its drain deadline.
const JOIN_MARGIN: Duration = Duration::from_secs(1);

/// Lifecycle state of the server-under-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    /// Whether `self -> next` is a legal forward step.
    pub fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::{Running, Starting, Stopped, Stopping};
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// How a `stop()` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    AlreadyStopped,
    /// All in-flight requests finished within the grace period.
    Drained { elapsed: Duration },
    /// The grace period ran out and remaining connections were aborted.
    Forced { aborted_connections: usize },
}

impl StopOutcome {
    /// A forced stop is a warning, not a failure.
    pub fn is_forced(&self) -> bool {
        matches!(self, StopOutcome::Forced { .. })
    }
}

/// What the server task reports once it has finished draining.
#[derive(Debug)]
enum DrainReport {
    Drained,
    Forced(usize),
}

/// The running server: its bound address, stop signal and task.
struct ServerHandle {
    addr: SocketAddr,
    grace_period: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<DrainReport>>,
}

impl ServerHandle {
    /// Signal the accept loop, wait for the drain, join the task.
    async fn shutdown(mut self) -> LifecycleResult<StopOutcome> {
        let started = Instant::now();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(mut task) = self.task.take() else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        match tokio::time::timeout(self.grace_period + JOIN_MARGIN, &mut task).await {
            Ok(Ok(DrainReport::Drained)) => Ok(StopOutcome::Drained {
                elapsed: started.elapsed(),
            }),
            Ok(Ok(DrainReport::Forced(aborted))) => {
                warn!(
                    addr = %self.addr,
                    aborted_connections = aborted,
                    grace_ms = self.grace_period.as_millis(),
                    "Drain exceeded grace period, connections aborted"
                );
                Ok(StopOutcome::Forced {
                    aborted_connections: aborted,
                })
            }
            Ok(Err(e)) => Err(LifecycleError::Join(e)),
            Err(_) => {
                task.abort();
                warn!(addr = %self.addr, "Server task did not finish in time, aborted");
                Ok(StopOutcome::Forced {
                    aborted_connections: 0,
                })
            }
        }
    }

    /// Tear down without waiting (for use in Drop).
    fn abort(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Owns one server-under-test instance over its running lifetime.
///
/// The resource root is provisioned (and cleaned) by the caller; the
/// lifecycle only serves it.
pub struct ServerLifecycle {
    root: PathBuf,
    state: ServerState,
    handle: Option<ServerHandle>,
}

impl ServerLifecycle {
    /// Create a stopped lifecycle serving `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: ServerState::Stopped,
            handle: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The bound address while running.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|h| h.addr)
    }

    /// Base URL (no trailing slash) while running.
    pub fn url(&self) -> Option<String> {
        self.addr().map(|addr| format!("http://{addr}"))
    }

    fn transition(&mut self, next: ServerState) -> LifecycleResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        trace!(from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
        Ok(())
    }

    /// Start the server and block until it accepts connections.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when an ephemeral port was requested.
    pub async fn start(&mut self, config: &ServerConfig) -> LifecycleResult<SocketAddr> {
        if self.state != ServerState::Stopped {
            return Err(LifecycleError::AlreadyRunning { state: self.state });
        }
        self.transition(ServerState::Starting)?;

        match self.launch(config).await {
            Ok(handle) => {
                let addr = handle.addr;
                self.handle = Some(handle);
                self.transition(ServerState::Running)?;
                info!(addr = %addr, root = %self.root.display(), "Server-under-test running");
                Ok(addr)
            }
            Err(e) => {
                self.transition(ServerState::Stopped)?;
                error!(error = %e, "Server-under-test failed to start");
                Err(e)
            }
        }
    }

    async fn launch(&self, config: &ServerConfig) -> LifecycleResult<ServerHandle> {
        if !self.root.is_dir() {
            return Err(LifecycleError::MissingRoot(self.root.clone()));
        }

        let listener = bind_with_retry(config.socket_addr(), config.bind_attempts).await?;
        let addr = listener.local_addr()?;
        debug!(addr = %addr, "Listener bound");

        let app = Arc::new(DavApp::new(&self.root, config));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, app, shutdown_rx, config.grace_period));

        let mut handle = ServerHandle {
            addr,
            grace_period: config.grace_period,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };

        if let Err(e) = wait_until_accepting(&handle, config.readiness_timeout).await {
            handle.abort();
            return Err(e);
        }
        Ok(handle)
    }

    /// Stop accepting, drain in-flight requests, join the server task.
    ///
    /// Calling this on a stopped lifecycle is a no-op.
    pub async fn stop(&mut self) -> LifecycleResult<StopOutcome> {
        if self.state == ServerState::Stopped {
            return Ok(StopOutcome::AlreadyStopped);
        }
        self.transition(ServerState::Stopping)?;
        info!(addr = ?self.addr(), "Stopping server-under-test");

        let result = match self.handle.take() {
            Some(handle) => handle.shutdown().await,
            None => Ok(StopOutcome::AlreadyStopped),
        };
        self.transition(ServerState::Stopped)?;

        match &result {
            Ok(outcome) => info!(outcome = ?outcome, "Server-under-test stopped"),
            Err(e) => error!(error = %e, "Server-under-test stopped abnormally"),
        }
        result
    }
}

/// Bind, retrying with backoff while the address is in use.
async fn bind_with_retry(addr: SocketAddr, attempts: u32) -> LifecycleResult<TcpListener> {
    let attempts = attempts.max(1);
    let mut backoff = BIND_INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempt < attempts => {
                warn!(addr = %addr, attempt, error = %e, "Address in use, retrying bind");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(source) => {
                return Err(LifecycleError::Bind {
                    addr,
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Address used to reach a listener bound to `addr`.
fn probe_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

/// Readiness barrier: poll-connect until the listener answers.
async fn wait_until_accepting(handle: &ServerHandle, timeout: Duration) -> LifecycleResult<()> {
    let addr = handle.addr;
    let target = probe_address(addr);
    let deadline = Instant::now() + timeout;
    let mut backoff = PROBE_INITIAL_BACKOFF;
    let mut probes = 0u32;

    loop {
        if handle.task.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(LifecycleError::Startup {
                addr,
                reason: "server task exited before accepting connections".to_string(),
            });
        }

        probes += 1;
        match tokio::time::timeout(PROBE_CONNECT_TIMEOUT, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => {
                debug!(addr = %addr, probes, "Server accepting connections");
                return Ok(());
            }
            Ok(Err(e)) => trace!(addr = %target, error = %e, "Readiness probe refused"),
            Err(_) => trace!(addr = %target, "Readiness probe timed out"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(LifecycleError::Startup {
                addr,
                reason: format!("not accepting connections after {timeout:?} ({probes} probes)"),
            });
        }
        tokio::time::sleep(backoff.min(deadline - now)).await;
        backoff = (backoff * 2).min(PROBE_MAX_BACKOFF);
    }
}

/// Run the server accept loop, then drain.
async fn serve(
    listener: TcpListener,
    app: Arc<DavApp>,
    mut shutdown_rx: oneshot::Receiver<()>,
    grace_period: Duration,
) -> DrainReport {
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                info!("Received shutdown signal");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    trace!(peer = %peer_addr, "Accepted connection");
                    let app = Arc::clone(&app);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let app = Arc::clone(&app);
                        async move { Ok::<_, Infallible>(app.handle(req).await) }
                    });
                    let conn = builder
                        .serve_connection(TokioIo::new(stream), service)
                        .into_owned();
                    let conn = graceful.watch(conn);
                    connections.spawn(async move {
                        // Readiness probes close without sending a request.
                        if let Err(e) = conn.await {
                            debug!(peer = %peer_addr, error = %e, "HTTP connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Stop accepting before draining.
    drop(listener);
    debug!(open_connections = connections.len(), "Draining connections");

    if tokio::time::timeout(grace_period, graceful.shutdown()).await.is_ok() {
        while connections.join_next().await.is_some() {}
        return DrainReport::Drained;
    }

    connections.abort_all();
    let mut aborted = 0;
    while let Some(result) = connections.join_next().await {
        if result.is_err_and(|e| e.is_cancelled()) {
            aborted += 1;
        }
    }
    DrainReport::Forced(aborted)
}
