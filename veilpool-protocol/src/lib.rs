//! # Shielded pool protocol engine
//!
//! The state machine behind a privacy pool: value enters as note
//! commitments, moves under zero-knowledge proofs, and leaves against
//! one-time nullifiers. This crate owns the rules; it does no I/O and
//! talks to no verifier directly.
//!
//! ## Surfaces
//!
//! - [`ShieldedPool`] executes typed [`Instruction`]s against a [`Ledger`]
//!   and returns typed [`Receipt`]s.
//! - Multi-phase operations (unshield, attested shield) park their
//!   parameters and proof payloads in the [`vault`](vault::OperationVault)
//!   between calls.
//! - Proof acceptance comes from oracle attestations carried inside the
//!   payload, or from an injected [`ProofVerifier`] when none is present.
//!   Mapping transport failures to [`PoolError::VerifierUnavailable`] is
//!   the embedder's job.
//!
//! Every call is metered against a per-call compute ceiling and reported
//! through a caller-supplied [`UsageReporter`].

pub mod batch;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod instructions;
pub mod ledger;
pub mod phase;
pub mod vault;

pub use budget::{CallMeter, NullReporter, RecordingReporter, UsageReporter};
pub use config::{PoolConfig, PoolConfigBuilder, DEFAULT_VAULT_TTL_SECS};
pub use engine::{ProofVerifier, ShieldedPool};
pub use error::{PoolError, Result};
pub use instructions::{Instruction, Receipt};
pub use ledger::{Ledger, MemoryLedger, NoteLedger, PoolState, VerifyingKeyRecord};
pub use phase::Phase;
pub use vault::{OperationParams, OperationVault, VaultEntry};
