//! Common utilities for harness integration tests.

#![allow(dead_code)]

use davprobe_harness::{HarnessConfig, ScenarioReport};
use davprobe_server::{Credentials, ServerConfig};
use rand::Rng;
use std::time::Duration;

/// Generate random bytes of specified size.
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::rng().fill(&mut data[..]);
    data
}

/// Configuration for a fresh local server with a short drain.
pub fn local_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_server(ServerConfig::default().with_grace_period(Duration::from_secs(1)))
}

/// Same as [`local_config`], with Basic authentication required.
pub fn auth_config() -> HarnessConfig {
    local_config().with_credentials(Credentials::new("tester", "tester"))
}

/// Panic with the failure if the scenario did not pass.
pub fn assert_passed(report: &ScenarioReport) {
    if let Some(failure) = &report.failure {
        panic!("Scenario '{}' failed: {failure}", report.scenario);
    }
}
