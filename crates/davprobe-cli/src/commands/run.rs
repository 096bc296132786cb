//! Run command - execute scenarios and report the outcome.
//!
//! # Examples
//!
//! ```bash
//! # Every built-in scenario, each against a fresh server
//! davprobe run
//!
//! # Machine-readable output
//! davprobe run reference --json | jq '.[] | select(.passed | not)'
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use davprobe_harness::{Harness, HarnessConfig, Scenario, ScenarioReport, catalog};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{ServerArgs, load_config, runtime};
use crate::exit_code;
use crate::output::{create_table, format_elapsed};

#[derive(ClapArgs, Clone, Debug)]
pub struct Args {
    /// Scenarios to run (all built-in scenarios when omitted)
    #[arg(value_name = "SCENARIO")]
    pub scenarios: Vec<String>,

    /// Harness config file (TOML); flags override its values
    #[arg(short, long, env = "DAVPROBE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Drive an already running server instead of starting one
    #[arg(long, env = "DAVPROBE_URL", conflicts_with_all = ["root", "port"])]
    pub url: Option<String>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ReportOutput {
    scenario: String,
    passed: bool,
    steps_run: usize,
    steps_total: usize,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureOutput>,
}

#[derive(Serialize)]
struct FailureOutput {
    step: usize,
    method: String,
    path: String,
    reason: String,
}

#[instrument(level = "info", name = "cmd::run", skip_all)]
pub fn execute(args: &Args) -> Result<u8> {
    let scenarios = select_scenarios(&args.scenarios)?;
    let config = build_config(args)?;

    let reports = runtime()?.block_on(run_scenarios(&config, &scenarios))?;

    if args.json {
        print_json(&scenarios, &reports)?;
    } else {
        print_table(&scenarios, &reports);
    }

    if reports.iter().all(ScenarioReport::passed) {
        Ok(exit_code::SUCCESS)
    } else {
        Ok(exit_code::SCENARIO_FAILED)
    }
}

fn select_scenarios(names: &[String]) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(catalog::all());
    }
    names
        .iter()
        .map(|name| match catalog::find(name) {
            Some(scenario) => Ok(scenario),
            None => bail!("Unknown scenario '{name}' (see `davprobe list`)"),
        })
        .collect()
}

fn build_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = args.server.apply(load_config(args.config.as_ref())?);
    if let Some(url) = &args.url {
        config.external_url = Some(url.clone());
    }
    Ok(config)
}

async fn run_scenarios(config: &HarnessConfig, scenarios: &[Scenario]) -> Result<Vec<ScenarioReport>> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        info!(scenario = %scenario.name, steps = scenario.len(), "Running scenario");
        let report = Harness::run(config, scenario)
            .await
            .with_context(|| format!("Scenario '{}' could not run", scenario.name))?;
        if let Some(failure) = &report.failure {
            warn!(scenario = %scenario.name, "{failure}");
        }
        reports.push(report);
    }
    Ok(reports)
}

fn print_json(scenarios: &[Scenario], reports: &[ScenarioReport]) -> Result<()> {
    let output: Vec<ReportOutput> = scenarios
        .iter()
        .zip(reports)
        .map(|(scenario, report)| ReportOutput {
            scenario: report.scenario.clone(),
            passed: report.passed(),
            steps_run: report.steps.len(),
            steps_total: scenario.len(),
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            failure: report.failure.as_ref().map(|failure| FailureOutput {
                step: failure.index,
                method: failure.method.to_string(),
                path: failure.path.clone(),
                reason: failure.kind.to_string(),
            }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_table(scenarios: &[Scenario], reports: &[ScenarioReport]) {
    let mut table = create_table();
    table.set_header(vec!["Scenario", "Result", "Steps", "Time", "Failure"]);

    for (scenario, report) in scenarios.iter().zip(reports) {
        let failure = report
            .failure
            .as_ref()
            .map(|f| format!("step {} ({} {}): {}", f.index, f.method, f.path, f.kind))
            .unwrap_or_default();
        table.add_row(vec![
            report.scenario.clone(),
            if report.passed() { "PASS" } else { "FAIL" }.to_string(),
            format!("{}/{}", report.steps.len(), scenario.len()),
            format_elapsed(report.elapsed),
            failure,
        ]);
    }
    println!("{table}");

    let failed = reports.iter().filter(|r| !r.passed()).count();
    println!("{} passed, {failed} failed", reports.len() - failed);
}
