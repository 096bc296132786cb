//! Serve command - run the server-under-test until interrupted.
//!
//! Useful for pointing `davprobe run --url` or another WebDAV client at
//! the same server the harness would start.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use davprobe_harness::Fixture;
use davprobe_server::StopOutcome;
use tracing::{info, instrument};

use super::{ServerArgs, load_config, runtime};
use crate::exit_code;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Harness config file (TOML); flags override its values
    #[arg(short, long, env = "DAVPROBE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[instrument(level = "info", name = "cmd::serve", skip_all)]
pub fn execute(args: &Args) -> Result<u8> {
    let mut config = args.server.apply(load_config(args.config.as_ref())?);
    config.external_url = None;

    runtime()?.block_on(async {
        let fixture = Fixture::start(&config)
            .await
            .context("Failed to start server")?;

        if let Some(root) = fixture.root() {
            eprintln!("Serving {}", root.display());
        }
        // The URL goes to stdout so scripts can capture it
        println!("{}", fixture.base_url());
        eprintln!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Interrupted, stopping server");

        match fixture.shutdown().await.context("Failed to stop server")? {
            Some(StopOutcome::Forced {
                aborted_connections,
            }) => eprintln!("Stopped ({aborted_connections} connections aborted)"),
            _ => eprintln!("Stopped"),
        }
        Ok(exit_code::SUCCESS)
    })
}
