//! List command - show the built-in scenarios.

use anyhow::Result;
use clap::Args as ClapArgs;
use davprobe_harness::catalog;
use serde::Serialize;
use tracing::instrument;

use crate::exit_code;
use crate::output::create_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ScenarioInfo {
    name: String,
    steps: usize,
    description: String,
}

#[instrument(level = "info", name = "cmd::list", skip_all)]
pub fn execute(args: &Args) -> Result<u8> {
    let scenarios: Vec<ScenarioInfo> = catalog::all()
        .into_iter()
        .map(|scenario| ScenarioInfo {
            steps: scenario.len(),
            name: scenario.name,
            description: scenario.description,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&scenarios)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Scenario", "Steps", "Description"]);
        for info in &scenarios {
            table.add_row(vec![
                info.name.clone(),
                info.steps.to_string(),
                info.description.clone(),
            ]);
        }
        println!("{table}");
    }

    Ok(exit_code::SUCCESS)
}
