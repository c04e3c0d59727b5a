//! The operation phase machine.
//!
//! Phases form a single straight line; there are no branches, retries or
//! shortcuts. The one permitted transition from each phase is encoded here
//! and nowhere else, so every advance in the vault goes through the same
//! table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a staged operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Semantic parameters recorded, nothing staged yet.
    Prepared,
    /// Proof payload staged and structurally validated.
    DataStaged,
    /// Attestation (or independent verifier) accepted the payload.
    Verified,
    /// State transition applied: nullifier inserted, ledger updated.
    Updated,
    /// Final effects recorded; the entry is ready to be finalized.
    Completed,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Phase; 5] = [
        Phase::Prepared,
        Phase::DataStaged,
        Phase::Verified,
        Phase::Updated,
        Phase::Completed,
    ];

    /// The single phase this one may advance to, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Prepared => Some(Phase::DataStaged),
            Phase::DataStaged => Some(Phase::Verified),
            Phase::Verified => Some(Phase::Updated),
            Phase::Updated => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    /// The single phase that may advance into this one, if any.
    pub fn prev(self) -> Option<Phase> {
        match self {
            Phase::Prepared => None,
            Phase::DataStaged => Some(Phase::Prepared),
            Phase::Verified => Some(Phase::DataStaged),
            Phase::Updated => Some(Phase::Verified),
            Phase::Completed => Some(Phase::Updated),
        }
    }

    /// Whether a single forward step from `self` to `to` is legal.
    pub fn can_advance_to(self, to: Phase) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepared => "prepared",
            Phase::DataStaged => "data_staged",
            Phase::Verified => "verified",
            Phase::Updated => "updated",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}
