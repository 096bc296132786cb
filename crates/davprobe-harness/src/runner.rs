//! Sequential, fail-fast scenario execution.

use std::time::{Duration, Instant};

use davprobe_client::{
    ClientError, DavResponse, LockToken, Multistatus, MultistatusError, PropertyName,
    ProtocolClient, StatusCode, Verb,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scenario::{Bindings, Capture, Check, Expect, Scenario, StatusClass, Step};

/// Why a step failed.
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error("expected {expected}, got {actual}")]
    StatusMismatch { expected: Expect, actual: StatusCode },

    #[error("expected exactly one lock token, got {count}")]
    TokenCount { count: usize },

    #[error("lock token bound to '{var}' changed from {expected} to {actual}")]
    TokenChanged {
        var: String,
        expected: LockToken,
        actual: LockToken,
    },

    #[error("variable '{0}' is not bound")]
    UnboundVariable(String),

    #[error("malformed response body: {0}")]
    MalformedBody(#[from] MultistatusError),

    #[error("property {name} not reported for {path}")]
    PropertyMissing { path: String, name: PropertyName },

    #[error("property {name} on {path}: expected {expected}, got {actual}")]
    PropertyStatus {
        path: String,
        name: PropertyName,
        expected: StatusClass,
        actual: StatusCode,
    },

    #[error("property {name} on {path}: expected '{expected}', got {actual:?}")]
    PropertyValue {
        path: String,
        name: PropertyName,
        expected: String,
        actual: Option<String>,
    },

    #[error("body mismatch: expected {expected_len} bytes, got {actual_len} bytes")]
    BodyMismatch {
        expected_len: usize,
        actual_len: usize,
    },

    #[error("multistatus has no response for {0}")]
    MissingHref(String),

    #[error("multistatus unexpectedly reports {0}")]
    UnexpectedHref(String),

    #[error("request failed: {0}")]
    Transport(#[from] ClientError),
}

/// The first step whose outcome violated its policy.
#[derive(Debug, Error)]
#[error("step {index} ({method} {path}) failed: {kind}")]
pub struct ScenarioFailure {
    pub index: usize,
    pub method: Verb,
    pub path: String,
    pub kind: FailureKind,
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub index: usize,
    pub method: Verb,
    pub path: String,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// The outcome of one scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: String,
    /// Steps that received a response, in order.
    pub steps: Vec<StepRecord>,
    pub failure: Option<ScenarioFailure>,
    pub elapsed: Duration,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(mut self) -> Result<Self, ScenarioFailure> {
        match self.failure.take() {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}

/// Drives a scenario through a protocol client, one step at a time.
pub struct ScenarioRunner<'a, C> {
    client: &'a C,
}

impl<'a, C: ProtocolClient> ScenarioRunner<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// Lock tokens captured here are discarded when the run ends.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let mut bindings = Bindings::default();
        let mut steps = Vec::with_capacity(scenario.len());

        info!(scenario = %scenario.name, steps = scenario.len(), "Running scenario");

        for (index, step) in scenario.steps.iter().enumerate() {
            if let Err(kind) = self.run_step(index, step, &mut bindings, &mut steps).await {
                let failure = ScenarioFailure {
                    index,
                    method: step.verb,
                    path: step.path.clone(),
                    kind,
                };
                warn!(scenario = %scenario.name, step = index, error = %failure, "Scenario failed");
                return ScenarioReport {
                    scenario: scenario.name.clone(),
                    steps,
                    failure: Some(failure),
                    elapsed: started.elapsed(),
                };
            }
        }

        let elapsed = started.elapsed();
        info!(scenario = %scenario.name, elapsed_ms = elapsed.as_millis(), "Scenario passed");
        ScenarioReport {
            scenario: scenario.name.clone(),
            steps,
            failure: None,
            elapsed,
        }
    }

    async fn run_step(
        &self,
        index: usize,
        step: &Step,
        bindings: &mut Bindings,
        records: &mut Vec<StepRecord>,
    ) -> Result<(), FailureKind> {
        let request = step.request(bindings)?;

        let started = Instant::now();
        let response = self.client.execute(&request).await?;
        let elapsed = started.elapsed();

        debug!(
            step = index,
            method = %step.verb,
            path = %step.path,
            status = response.status.as_u16(),
            elapsed_ms = elapsed.as_millis(),
            "Step completed"
        );
        records.push(StepRecord {
            index,
            method: step.verb,
            path: step.path.clone(),
            status: response.status,
            elapsed,
        });

        verify(step, &response, bindings)
    }
}

/// Judge a response against the step's policy, captures and checks.
fn verify(step: &Step, response: &DavResponse, bindings: &mut Bindings) -> Result<(), FailureKind> {
    if !step.expect.accepts(response.status) {
        return Err(FailureKind::StatusMismatch {
            expected: step.expect,
            actual: response.status,
        });
    }
    if step.expect == Expect::Tolerated {
        return Ok(());
    }

    if let Some(Capture::LockToken(var)) = &step.capture {
        let token = single_token(response)?;
        debug!(var = %var, "Bound lock token");
        bindings.bind(var.clone(), token);
    }

    let multistatus = if step.checks.iter().any(Check::needs_multistatus) {
        Some(response.multistatus()?)
    } else {
        None
    };

    for check in &step.checks {
        evaluate(check, response, multistatus.as_ref(), bindings)?;
    }
    Ok(())
}

fn single_token(response: &DavResponse) -> Result<LockToken, FailureKind> {
    let mut tokens = response.issued_lock_tokens()?;
    if tokens.len() != 1 {
        return Err(FailureKind::TokenCount {
            count: tokens.len(),
        });
    }
    Ok(tokens.remove(0))
}

fn evaluate(
    check: &Check,
    response: &DavResponse,
    multistatus: Option<&Multistatus>,
    bindings: &Bindings,
) -> Result<(), FailureKind> {
    match check {
        Check::Body(expected) => {
            if response.body != *expected {
                return Err(FailureKind::BodyMismatch {
                    expected_len: expected.len(),
                    actual_len: response.body.len(),
                });
            }
        }
        Check::SameToken(var) => {
            let expected = bindings.token(var)?;
            let actual = single_token(response)?;
            if actual != *expected {
                return Err(FailureKind::TokenChanged {
                    var: var.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Check::Href(path) => {
            if !multistatus.is_some_and(|ms| ms.contains(path)) {
                return Err(FailureKind::MissingHref(path.clone()));
            }
        }
        Check::NoHref(path) => {
            if multistatus.is_some_and(|ms| ms.contains(path)) {
                return Err(FailureKind::UnexpectedHref(path.clone()));
            }
        }
        Check::PropertyStatus { path, name, class } => {
            let prop = multistatus
                .and_then(|ms| ms.property(path, name))
                .ok_or_else(|| FailureKind::PropertyMissing {
                    path: path.clone(),
                    name: name.clone(),
                })?;
            if !class.contains(prop.status) {
                return Err(FailureKind::PropertyStatus {
                    path: path.clone(),
                    name: name.clone(),
                    expected: *class,
                    actual: prop.status,
                });
            }
        }
        Check::PropertyValue { path, name, value } => {
            let prop = multistatus
                .and_then(|ms| ms.property(path, name))
                .ok_or_else(|| FailureKind::PropertyMissing {
                    path: path.clone(),
                    name: name.clone(),
                })?;
            if !prop.status.is_success() {
                return Err(FailureKind::PropertyStatus {
                    path: path.clone(),
                    name: name.clone(),
                    expected: StatusClass::Success,
                    actual: prop.status,
                });
            }
            if prop.property.value.as_deref() != Some(value.as_str()) {
                return Err(FailureKind::PropertyValue {
                    path: path.clone(),
                    name: name.clone(),
                    expected: value.clone(),
                    actual: prop.property.value.clone(),
                });
            }
        }
    }
    Ok(())
}
