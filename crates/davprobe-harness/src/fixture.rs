//! Per-run setup and teardown.
//!
//! A [`Fixture`] provisions a resource root, starts the server-under-test
//! on it and binds a client to the reported address. [`Harness`] wraps a
//! fixture around one scenario and always stops the server afterwards,
//! whether the scenario passed or not.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use davprobe_client::DavClient;
use davprobe_server::{ServerLifecycle, StopOutcome};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::runner::{ScenarioReport, ScenarioRunner};
use crate::scenario::Scenario;

/// A running server-under-test (or an external target) plus its client.
pub struct Fixture {
    lifecycle: Option<ServerLifecycle>,
    client: DavClient,
    root: Option<PathBuf>,
    // Dropped after the lifecycle so the directory outlives the server
    _temp: Option<TempDir>,
}

impl Fixture {
    /// Provision, start and connect.
    pub async fn start(config: &HarnessConfig) -> HarnessResult<Self> {
        if let Some(url) = &config.external_url {
            info!(url = %url, "Using external server");
            let client = DavClient::new(url, config.client_config())?;
            return Ok(Self {
                lifecycle: None,
                client,
                root: None,
                _temp: None,
            });
        }

        let (root, temp) = provision_root(config.root.as_deref())?;
        let mut lifecycle = ServerLifecycle::new(&root);
        let addr = lifecycle.start(&config.server).await?;

        let client = match DavClient::new(&client_url(addr), config.client_config()) {
            Ok(client) => client,
            Err(e) => {
                if let Err(stop_err) = lifecycle.stop().await {
                    warn!(error = %stop_err, "Failed to stop server after client error");
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            lifecycle: Some(lifecycle),
            client,
            root: Some(root),
            _temp: temp,
        })
    }

    pub fn client(&self) -> &DavClient {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// The resource root, unless driving an external server.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.lifecycle.as_ref().and_then(ServerLifecycle::addr)
    }

    pub fn is_external(&self) -> bool {
        self.lifecycle.is_none()
    }

    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        ScenarioRunner::new(&self.client).run(scenario).await
    }

    /// Stop the server. A slow drain is logged, not returned as an error.
    pub async fn shutdown(mut self) -> HarnessResult<Option<StopOutcome>> {
        let Some(lifecycle) = self.lifecycle.as_mut() else {
            return Ok(None);
        };
        let outcome = lifecycle.stop().await?;
        if let StopOutcome::Forced {
            aborted_connections,
        } = outcome
        {
            warn!(aborted_connections, "Server drain exceeded grace period");
        }
        Ok(Some(outcome))
    }
}

/// Entry points that own a fixture for the duration of a run.
pub struct Harness;

impl Harness {
    /// Run one scenario against a fresh server; the server is stopped
    /// on every path out of here.
    pub async fn run(config: &HarnessConfig, scenario: &Scenario) -> HarnessResult<ScenarioReport> {
        let fixture = Fixture::start(config).await?;
        let report = fixture.run(scenario).await;
        fixture.shutdown().await?;
        Ok(report)
    }

    /// Like [`Harness::run`], but a failed scenario is an error.
    pub async fn run_passing(
        config: &HarnessConfig,
        scenario: &Scenario,
    ) -> HarnessResult<ScenarioReport> {
        Self::run(config, scenario)
            .await?
            .into_result()
            .map_err(|failure| HarnessError::Scenario {
                scenario: scenario.name.clone(),
                failure: Box::new(failure),
            })
    }

    /// Run scenarios one after another, each against its own server.
    pub async fn run_all(
        config: &HarnessConfig,
        scenarios: &[Scenario],
    ) -> HarnessResult<Vec<ScenarioReport>> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(Self::run(config, scenario).await?);
        }
        Ok(reports)
    }
}

/// Use the configured root (created if missing) or a fresh temp directory.
fn provision_root(configured: Option<&Path>) -> HarnessResult<(PathBuf, Option<TempDir>)> {
    if let Some(path) = configured {
        std::fs::create_dir_all(path).map_err(|source| HarnessError::Provision {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok((path.to_path_buf(), None));
    }

    let temp = tempfile::Builder::new()
        .prefix("davprobe-")
        .tempdir()
        .map_err(|source| HarnessError::Provision {
            path: std::env::temp_dir(),
            source,
        })?;
    Ok((temp.path().to_path_buf(), Some(temp)))
}

/// URL a local client should use for a bound address.
fn client_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_url_maps_unspecified_to_loopback() {
        assert_eq!(
            client_url("0.0.0.0:8080".parse().unwrap()),
            "http://127.0.0.1:8080"
        );
        assert_eq!(client_url("[::]:8080".parse().unwrap()), "http://[::1]:8080");
        assert_eq!(
            client_url("127.0.0.1:9000".parse().unwrap()),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_provision_temp_root() {
        let (root, temp) = provision_root(None).unwrap();
        assert!(root.is_dir());
        drop(temp);
        assert!(!root.exists(), "Temp root is removed on drop");
    }

    #[test]
    fn test_provision_configured_root_is_created_and_kept() {
        let parent = TempDir::new().unwrap();
        let configured = parent.path().join("nested").join("root");

        let (root, temp) = provision_root(Some(&configured)).unwrap();

        assert_eq!(root, configured);
        assert!(temp.is_none());
        assert!(configured.is_dir());
    }

    #[test]
    fn test_provision_failure_names_path() {
        let parent = TempDir::new().unwrap();
        let file = parent.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let err = provision_root(Some(&file.join("below-a-file"))).unwrap_err();

        assert!(matches!(err, HarnessError::Provision { .. }));
    }

    #[tokio::test]
    async fn test_external_fixture_skips_lifecycle() {
        let config = HarnessConfig::default().with_external_url("http://127.0.0.1:1/");
        let fixture = Fixture::start(&config).await.unwrap();

        assert!(fixture.is_external());
        assert!(fixture.root().is_none());
        assert!(fixture.addr().is_none());
        assert_eq!(fixture.base_url(), "http://127.0.0.1:1");
        assert_eq!(fixture.shutdown().await.unwrap(), None);
    }
}
