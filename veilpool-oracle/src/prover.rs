//! Proof generation behind a strategy trait, so embedders can swap the
//! real proving service for a deterministic mock in tests and local
//! development.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use veilpool_common::{OperationKind, ProofBlob, PublicInputs, PROOF_LEN};

use crate::error::OracleError;

pub const DEFAULT_PROVER_URL: &str = "http://127.0.0.1:9400";
/// Proving runs far longer than verification.
pub const DEFAULT_PROVER_TIMEOUT_SECS: u64 = 120;

/// What the prover needs: the circuit to prove against, the public inputs
/// the proof must open to, and the circuit-specific private witness.
#[derive(Clone, Debug)]
pub struct ProofRequest {
    pub kind: OperationKind,
    pub public_inputs: PublicInputs,
    pub witness: serde_json::Value,
}

/// A generated proof together with the public inputs it opens to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofArtifact {
    pub proof: ProofBlob,
    pub public_inputs: PublicInputs,
}

/// Source of proofs for pool operations.
#[async_trait]
pub trait ProofSource {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, OracleError>;

    /// Whether the source is ready to prove.
    async fn health(&self) -> bool;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    public_inputs: String,
    witness: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    proof: String,
}

/// Client for a remote proving service exposing
/// `POST /generate-proof/{circuit}`.
pub struct HttpProofService {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProofService {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| OracleError::Config(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Load the prover endpoint from `VEILPOOL_PROVER_*` environment
    /// variables.
    pub fn from_env() -> Result<Self, OracleError> {
        let base_url =
            env::var("VEILPOOL_PROVER_URL").unwrap_or_else(|_| DEFAULT_PROVER_URL.to_string());
        let timeout_secs = env::var("VEILPOOL_PROVER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PROVER_TIMEOUT_SECS);
        Self::new(base_url, timeout_secs)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProofSource for HttpProofService {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, OracleError> {
        let url = self.endpoint(&format!("/generate-proof/{}", request.kind.tag()));
        let body = GenerateRequest {
            public_inputs: hex::encode(request.public_inputs.as_bytes()),
            witness: &request.witness,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| OracleError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Http {
                status: status.as_u16(),
            });
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| OracleError::InvalidResponse(err.to_string()))?;
        let raw = hex::decode(&body.proof)
            .map_err(|err| OracleError::InvalidResponse(format!("proof hex: {err}")))?;
        let proof = ProofBlob::from_bytes(&raw)
            .map_err(|err| OracleError::InvalidResponse(err.to_string()))?;

        debug!("prover returned a {} proof for {url}", request.kind);
        Ok(ProofArtifact {
            proof,
            public_inputs: request.public_inputs.clone(),
        })
    }

    async fn health(&self) -> bool {
        let url = self.endpoint("/health");
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Deterministic stand-in for the proving service. Proof bytes depend
/// only on the circuit and the public inputs, so repeated runs agree.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockProofSource;

impl MockProofSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProofSource for MockProofSource {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, OracleError> {
        Ok(ProofArtifact {
            proof: mock_proof(request.kind, &request.public_inputs),
            public_inputs: request.public_inputs.clone(),
        })
    }

    async fn health(&self) -> bool {
        true
    }
}

/// The proof bytes [`MockProofSource`] produces, exposed synchronously so
/// non-async tests can predict them.
pub fn mock_proof(kind: OperationKind, public_inputs: &PublicInputs) -> ProofBlob {
    let mut hasher = blake3::Hasher::new_derive_key("veilpool/mock-proof/v1");
    hasher.update(&kind.circuit_tag());
    hasher.update(public_inputs.as_bytes());
    let mut bytes = [0u8; PROOF_LEN];
    hasher.finalize_xof().fill(&mut bytes);
    ProofBlob::from_array(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs() -> PublicInputs {
        PublicInputs::new(vec![5u8; 64]).unwrap()
    }

    #[test]
    fn mock_proofs_are_deterministic_per_circuit() {
        let a = mock_proof(OperationKind::Transfer, &inputs());
        let b = mock_proof(OperationKind::Transfer, &inputs());
        let c = mock_proof(OperationKind::Unshield, &inputs());
        assert_eq!(a, b);
        assert_ne!(a, c, "different circuits must yield different proofs");
    }

    #[tokio::test]
    async fn mock_source_echoes_the_public_inputs() {
        let source = MockProofSource::new();
        let request = ProofRequest {
            kind: OperationKind::Shield,
            public_inputs: inputs(),
            witness: json!({ "note_randomness": "0f0f" }),
        };
        let artifact = source.generate(&request).await.unwrap();
        assert_eq!(artifact.public_inputs, inputs());
        assert_eq!(
            artifact.proof,
            mock_proof(OperationKind::Shield, &inputs())
        );
        assert!(source.health().await);
    }
}
