//! Default status policies per operation.
//!
//! These are the outcomes a conforming server produces for each verb in
//! the situation the step describes. Step constructors pick their policy
//! from here.

use davprobe_client::{StatusCode, Verb};

use crate::scenario::{Expect, StatusClass};

/// A verb in a known precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MkcolNew,
    PutNew,
    PutReplace,
    GetExisting,
    GetMissing,
    Delete,
    Cleanup,
    LockNew,
    LockRefresh,
    LockConflict,
    Unlock,
    UnlockConsumed,
    Proppatch,
    TransferReplace,
    TransferNew,
    Propfind,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Self::MkcolNew,
        Self::PutNew,
        Self::PutReplace,
        Self::GetExisting,
        Self::GetMissing,
        Self::Delete,
        Self::Cleanup,
        Self::LockNew,
        Self::LockRefresh,
        Self::LockConflict,
        Self::Unlock,
        Self::UnlockConsumed,
        Self::Proppatch,
        Self::TransferReplace,
        Self::TransferNew,
        Self::Propfind,
    ];

    pub fn expect(self) -> Expect {
        match self {
            Self::MkcolNew | Self::PutNew | Self::LockNew | Self::TransferNew => {
                Expect::Status(StatusCode::CREATED)
            }
            Self::PutReplace | Self::Unlock | Self::TransferReplace => {
                Expect::Status(StatusCode::NO_CONTENT)
            }
            Self::GetExisting | Self::LockRefresh => Expect::Status(StatusCode::OK),
            Self::GetMissing => Expect::Status(StatusCode::NOT_FOUND),
            Self::Delete => Expect::Class(StatusClass::Success),
            Self::Cleanup => Expect::Tolerated,
            Self::LockConflict => Expect::Rejected,
            Self::UnlockConsumed => Expect::Class(StatusClass::ClientError),
            Self::Proppatch | Self::Propfind => Expect::Status(StatusCode::MULTI_STATUS),
        }
    }

    pub fn verbs(self) -> &'static [Verb] {
        match self {
            Self::MkcolNew => &[Verb::Mkcol],
            Self::PutNew | Self::PutReplace => &[Verb::Put],
            Self::GetExisting | Self::GetMissing => &[Verb::Get],
            Self::Delete | Self::Cleanup => &[Verb::Delete],
            Self::LockNew | Self::LockRefresh | Self::LockConflict => &[Verb::Lock],
            Self::Unlock | Self::UnlockConsumed => &[Verb::Unlock],
            Self::Proppatch => &[Verb::Proppatch],
            Self::TransferReplace | Self::TransferNew => &[Verb::Copy, Verb::Move],
            Self::Propfind => &[Verb::Propfind],
        }
    }

    pub fn condition(self) -> &'static str {
        match self {
            Self::MkcolNew => "on a non-existent collection",
            Self::PutNew => "creating a new resource",
            Self::PutReplace => "replacing an existing resource",
            Self::GetExisting => "of an existing resource",
            Self::GetMissing => "of a path never created",
            Self::Delete => "of an existing resource",
            Self::Cleanup => "of a possibly-absent resource",
            Self::LockNew => "exclusive or shared, depth infinity, on an unlocked new resource (one token)",
            Self::LockRefresh => "refresh with the held token (same token)",
            Self::LockConflict => "exclusive, on a resource locked by another token",
            Self::Unlock => "with a valid, unconsumed token",
            Self::UnlockConsumed => "with an already-consumed token",
            Self::Proppatch => "setting or removing properties (each property 2xx)",
            Self::TransferReplace => "overwrite T, depth infinity, destination exists",
            Self::TransferNew => "overwrite T, depth infinity, destination absent",
            Self::Propfind => "depth 0, 1 or unspecified (infinity)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        let cases = [
            (Operation::MkcolNew, StatusCode::CREATED),
            (Operation::PutNew, StatusCode::CREATED),
            (Operation::PutReplace, StatusCode::NO_CONTENT),
            (Operation::LockNew, StatusCode::CREATED),
            (Operation::LockRefresh, StatusCode::OK),
            (Operation::Unlock, StatusCode::NO_CONTENT),
            (Operation::TransferReplace, StatusCode::NO_CONTENT),
            (Operation::TransferNew, StatusCode::CREATED),
            (Operation::Propfind, StatusCode::MULTI_STATUS),
            (Operation::Proppatch, StatusCode::MULTI_STATUS),
            (Operation::GetMissing, StatusCode::NOT_FOUND),
        ];
        for (operation, status) in cases {
            assert_eq!(operation.expect(), Expect::Status(status), "{operation:?}");
        }
    }

    #[test]
    fn test_failures_are_asserted_not_tolerated() {
        assert_eq!(
            Operation::UnlockConsumed.expect(),
            Expect::Class(StatusClass::ClientError)
        );
        assert_eq!(Operation::LockConflict.expect(), Expect::Rejected);
        assert!(!Operation::UnlockConsumed.expect().accepts(StatusCode::NO_CONTENT));
        assert!(!Operation::LockConflict.expect().accepts(StatusCode::OK));
    }

    #[test]
    fn test_only_cleanup_is_tolerated() {
        let tolerated: Vec<_> = Operation::ALL
            .iter()
            .filter(|op| op.expect() == Expect::Tolerated)
            .collect();
        assert_eq!(tolerated, vec![&Operation::Cleanup]);
    }

    #[test]
    fn test_every_verb_has_a_policy() {
        for verb in Verb::ALL {
            assert!(
                Operation::ALL.iter().any(|op| op.verbs().contains(&verb)),
                "No default policy for {verb}"
            );
        }
    }
}
