//! Harness-level errors.
//!
//! These abort a run. Protocol-level outcomes (a step that got the wrong
//! status) are [`ScenarioFailure`]s and normally live in the report; they
//! only become a [`HarnessError`] through [`crate::Harness::run_passing`].

use std::io;
use std::path::PathBuf;

use davprobe_client::ClientError;
use davprobe_server::LifecycleError;
use thiserror::Error;

use crate::runner::ScenarioFailure;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Server lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to provision resource root {}: {source}", .path.display())]
    Provision {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to build protocol client: {0}")]
    Client(#[from] ClientError),

    #[error("Failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Scenario '{scenario}': {failure}")]
    Scenario {
        scenario: String,
        failure: Box<ScenarioFailure>,
    },
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FailureKind;
    use davprobe_client::Verb;

    #[test]
    fn test_provision_error_names_path() {
        let err = HarnessError::Provision {
            path: PathBuf::from("/srv/dav"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to provision resource root /srv/dav: denied"
        );
    }

    #[test]
    fn test_scenario_error_carries_step() {
        let err = HarnessError::Scenario {
            scenario: "reference".to_string(),
            failure: Box::new(ScenarioFailure {
                index: 3,
                method: Verb::Unlock,
                path: "/test/lock-0".to_string(),
                kind: FailureKind::UnboundVariable("lock0".to_string()),
            }),
        };
        assert_eq!(
            err.to_string(),
            "Scenario 'reference': step 3 (UNLOCK /test/lock-0) failed: variable 'lock0' is not bound"
        );
    }
}
