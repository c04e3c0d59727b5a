//! Oracle-side failures. None of these are proof verdicts: a definitive
//! negative verdict comes back as a successful response with
//! `is_valid = false`, and it is the embedder's job to surface transport
//! failures as retryable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle could not be reached (connect failure, timeout, DNS).
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with a non-success status.
    #[error("oracle returned status {status}")]
    Http { status: u16 },

    /// The response body or the attestation inside it did not decode.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),

    /// The attestation does not bind the proof, public inputs and
    /// verifying key that were submitted.
    #[error("attestation does not bind the submitted material")]
    BindingMismatch,

    /// The attestation signature does not verify under the configured
    /// oracle public key.
    #[error("attestation signature rejected")]
    BadSignature,

    /// Client-side configuration problem.
    #[error("oracle configuration error: {0}")]
    Config(String),
}
