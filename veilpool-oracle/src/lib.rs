//! # Oracle and prover clients for the veilpool shielded pool
//!
//! The pool engine itself does no I/O; this crate holds the async HTTP
//! clients that surround it:
//!
//! - [`VerifierOracleClient`] submits proofs to the verification oracle
//!   and validates the signed attestation it returns, re-deriving every
//!   binding hash locally.
//! - [`ProofSource`] abstracts proof generation, with
//!   [`HttpProofService`] for a real proving service and
//!   [`MockProofSource`] for deterministic tests.
//!
//! Failures here are transport-level ([`OracleError`]); a proof found
//! invalid is a successful [`VerificationOutcome`] with
//! `is_valid = false`. Embedders surface [`OracleError`] as a retryable
//! verifier outage, never as a proof rejection.

pub mod error;
pub mod prover;
pub mod verifier;

pub use error::OracleError;
pub use prover::{mock_proof, HttpProofService, MockProofSource, ProofArtifact, ProofRequest, ProofSource};
pub use verifier::{
    VerificationOutcome, VerifierClientConfig, VerifierClientConfigBuilder, VerifierOracleClient,
};
