//! Configuration for the server-under-test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default time allowed for the listener to become observably ready.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for in-flight requests to finish on stop.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Default number of bind attempts when the address is in use.
pub const DEFAULT_BIND_ATTEMPTS: u32 = 3;

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the server-under-test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_address: IpAddr,
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Require Basic authentication with these credentials.
    pub credentials: Option<Credentials>,
    /// Upper bound on waiting for the listener to accept connections.
    #[serde(with = "humantime_serde")]
    pub readiness_timeout: Duration,
    /// Upper bound on draining in-flight requests during stop.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    /// How many times to try binding an address that is in use.
    pub bind_attempts: u32,
    /// Serve PROPFIND with `Depth: infinity` (or no Depth header).
    pub allow_infinite_depth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // Auto-assign
            credentials: None,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            bind_attempts: DEFAULT_BIND_ATTEMPTS,
            allow_infinite_depth: true,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Set the port (0 for an OS-assigned ephemeral port).
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Require Basic authentication.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_bind_attempts(mut self, attempts: u32) -> Self {
        self.bind_attempts = attempts;
        self
    }
}
