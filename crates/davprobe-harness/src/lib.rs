//! Scenario runner and fixtures for WebDAV conformance runs.
//!
//! A run wires three pieces together:
//!
//! 1. [`Fixture`] provisions a resource root and starts the
//!    server-under-test, blocking until it accepts connections
//! 2. [`ScenarioRunner`] issues a [`Scenario`]'s steps strictly in order
//!    and stops at the first step whose outcome violates its policy
//! 3. The fixture stops the server, draining in-flight requests
//!
//! [`Harness::run`] does all three and guarantees the stop.
//!
//! # Example
//!
//! ```no_run
//! use davprobe_harness::{Harness, HarnessConfig, catalog};
//!
//! # async fn example() -> Result<(), davprobe_harness::HarnessError> {
//! let report = Harness::run(&HarnessConfig::default(), &catalog::reference()).await?;
//! if let Some(failure) = &report.failure {
//!     eprintln!("{failure}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
mod config;
mod error;
mod fixture;
pub mod policy;
mod runner;
mod scenario;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use fixture::{Fixture, Harness};
pub use policy::Operation;
pub use runner::{FailureKind, ScenarioFailure, ScenarioReport, ScenarioRunner, StepRecord};
pub use scenario::{
    Bindings, Capture, Check, Expect, LOCK_OWNER, Payload, REFRESH_TIMEOUT, Scenario, StatusClass,
    Step,
};
