//! CLI command implementations.

pub mod list;
pub mod run;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use davprobe_harness::HarnessConfig;
use davprobe_server::Credentials;

/// Server-under-test overrides shared by `run` and `serve`.
#[derive(ClapArgs, Clone, Debug, Default)]
pub struct ServerArgs {
    /// Resource root (a fresh temporary directory when unset)
    #[arg(long, env = "DAVPROBE_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Port to bind (0 picks a free port)
    #[arg(long, env = "DAVPROBE_PORT")]
    pub port: Option<u16>,

    /// Require Basic authentication with this user name
    #[arg(long, env = "DAVPROBE_USER", requires = "password")]
    pub user: Option<String>,

    /// Password for --user (prefer DAVPROBE_PASSWORD)
    #[arg(long, env = "DAVPROBE_PASSWORD", hide_env_values = true, requires = "user")]
    pub password: Option<String>,
}

impl ServerArgs {
    /// Apply command-line values over a loaded configuration.
    pub fn apply(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(root) = &self.root {
            config.root = Some(root.clone());
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            config.server.credentials = Some(Credentials::new(user.clone(), password.clone()));
        }
        config
    }
}

/// Load the config file if one was given, defaults otherwise.
pub fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

/// Build the async runtime commands run on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = ServerArgs {
            root: Some(PathBuf::from("/tmp/dav")),
            port: Some(8080),
            user: Some("tester".to_string()),
            password: Some("secret".to_string()),
        };

        let config = args.apply(HarnessConfig::default());

        assert_eq!(config.root, Some(PathBuf::from("/tmp/dav")));
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.credentials,
            Some(Credentials::new("tester", "secret"))
        );
    }

    #[test]
    fn test_apply_keeps_file_values_without_flags() {
        let file = HarnessConfig::default()
            .with_root("/srv/dav")
            .with_credentials(Credentials::new("file", "user"));

        let config = ServerArgs::default().apply(file);

        assert_eq!(config.root, Some(PathBuf::from("/srv/dav")));
        assert_eq!(config.server.port, 0);
        assert_eq!(
            config.server.credentials,
            Some(Credentials::new("file", "user"))
        );
    }

    #[test]
    fn test_load_config_default_without_path() {
        let config = load_config(None).unwrap();
        assert!(config.external_url.is_none());
    }
}
