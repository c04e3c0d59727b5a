//! Error taxonomy for the pool core.
//!
//! Every failure an operation can hit maps to exactly one variant here;
//! nothing is logged-and-swallowed. Structural (codec) failures are wrapped
//! rather than restated so the original length/flag detail survives.

use thiserror::Error;

use veilpool_common::{CodecError, Nullifier, OperationId};

use crate::phase::Phase;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Malformed payload: wrong proof length, bad presence flag, truncated
    /// or misaligned bytes.
    #[error("malformed payload: {0}")]
    Structural(#[from] CodecError),

    /// A phase-ordered step was attempted out of order.
    #[error("operation {operation} is in phase {actual}, expected {expected}")]
    InvalidPhase {
        operation: OperationId,
        expected: Phase,
        actual: Phase,
    },

    /// No vault entry exists for this (user, operation) pair.
    #[error("no vault entry for operation {0}")]
    NotFound(OperationId),

    /// A vault entry already exists for this (user, operation) pair.
    #[error("vault entry for operation {0} already exists")]
    AlreadyExists(OperationId),

    /// The proof payload failed verification: a definitive negative oracle
    /// verdict, an attestation binding mismatch, or an independent
    /// verifier returning false.
    #[error("proof rejected: {reason}")]
    ProofRejected { reason: String },

    /// The nullifier is already in the global spent set.
    #[error("nullifier {0} already spent")]
    NullifierAlreadyUsed(Nullifier),

    /// Two items within one batch would spend the same nullifier.
    #[error("duplicate nullifier {0} within batch")]
    DuplicateNullifier(Nullifier),

    /// The external verifier could not be reached or answered outside the
    /// protocol. Distinct from [`PoolError::ProofRejected`]: no verdict was
    /// reached.
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// More items than the effective batch maximum allows.
    #[error("batch of {len} items exceeds the maximum of {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// A batch must carry at least one item.
    #[error("batch is empty")]
    EmptyBatch,

    /// The call would exceed the per-call compute ceiling.
    #[error("compute budget exceeded: {used} of {ceiling} units")]
    BudgetExceeded { used: u64, ceiling: u64 },

    /// transfer_from asked for more than the remaining allowance.
    #[error("allowance too low: {remaining} remaining, {requested} requested")]
    InsufficientAllowance { remaining: u64, requested: u64 },

    /// The pool's note ledger cannot cover the requested withdrawal.
    #[error("pool balance {balance} cannot cover withdrawal of {requested}")]
    InsufficientPoolBalance { balance: u64, requested: u64 },

    /// Note-ledger accounting would overflow a u64.
    #[error("value overflow in note ledger accounting")]
    ValueOverflow,

    /// The instruction's stated amount disagrees with the amount disclosed
    /// in the proof's public inputs.
    #[error("instruction amount {instruction} does not match disclosed amount {disclosed}")]
    AmountMismatch { instruction: u64, disclosed: u64 },

    /// No verifying key is registered under this (circuit, version) pair.
    #[error("no verifying key registered for circuit {circuit} v{version}")]
    UnknownVerifyingKey { circuit: String, version: u32 },

    /// A verifying key is already registered under this (circuit, version)
    /// pair; records are immutable once written.
    #[error("verifying key for circuit {circuit} v{version} already registered")]
    VerifyingKeyExists { circuit: String, version: u32 },

    /// The verifying key for this circuit has been revoked.
    #[error("verifying key for circuit {circuit} v{version} is revoked")]
    VerifyingKeyRevoked { circuit: String, version: u32 },
}
