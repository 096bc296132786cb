//! Process exit codes.
//!
//! Scripts can tell a failing server apart from a broken run.

/// Every scenario passed (or the command succeeded).
pub const SUCCESS: u8 = 0;

/// At least one scenario failed a step.
pub const SCENARIO_FAILED: u8 = 1;

/// The run could not be carried out: bad config, bind or startup failure,
/// unknown scenario.
pub const HARNESS_ERROR: u8 = 2;
