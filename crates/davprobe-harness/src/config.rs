//! Harness configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! request_timeout = "30s"
//! root = "/tmp/davprobe-root"
//!
//! [server]
//! port = 0
//! grace_period = "2s"
//!
//! [server.credentials]
//! username = "tester"
//! password = "tester"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use davprobe_client::{ClientConfig, DEFAULT_REQUEST_TIMEOUT};
use davprobe_server::{Credentials, ServerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Server-under-test settings; the credentials are also what the
    /// client presents.
    pub server: ServerConfig,
    /// Resource root; a fresh temporary directory per run when unset.
    pub root: Option<PathBuf>,
    /// Drive an already running server instead of starting one.
    pub external_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            root: None,
            external_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(s: &str) -> HarnessResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    #[must_use]
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.server.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Client settings matching this configuration.
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default().with_timeout(self.request_timeout);
        match &self.server.credentials {
            Some(credentials) => {
                config.with_basic_auth(credentials.username.clone(), credentials.password.clone())
            }
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(config.root.is_none());
        assert!(config.external_url.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.server.port, 0);
    }

    #[test]
    fn test_parse_toml() {
        let config = HarnessConfig::from_toml_str(
            r#"
            request_timeout = "5s"
            root = "/tmp/dav"

            [server]
            port = 8080
            grace_period = "500ms"

            [server.credentials]
            username = "tester"
            password = "tester"
            "#,
        )
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.root, Some(PathBuf::from("/tmp/dav")));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.grace_period, Duration::from_millis(500));
        assert_eq!(
            config.server.credentials,
            Some(Credentials::new("tester", "tester"))
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = HarnessConfig::from_toml_str("").unwrap();
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.server.credentials.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let err = HarnessConfig::from_toml_str("request_timeout = 5").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_client_config_uses_server_credentials() {
        let config = HarnessConfig::default()
            .with_credentials(Credentials::new("tester", "tester"))
            .with_request_timeout(Duration::from_secs(3));

        let client = config.client_config();

        assert_eq!(client.username.as_deref(), Some("tester"));
        assert_eq!(client.password.as_deref(), Some("tester"));
        assert_eq!(client.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load(Path::new("/nonexistent/davprobe.toml")).unwrap_err();
        assert!(matches!(err, HarnessError::ConfigRead { .. }));
    }
}
