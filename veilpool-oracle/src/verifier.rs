//! HTTP client for the external verification oracle.
//!
//! The oracle exposes `POST /verify` taking the proof, public inputs and
//! verifying key as hex, and answers with a verdict plus a signed
//! attestation binding exactly that material. The client re-derives every
//! binding hash locally; nothing the oracle claims is taken on trust.

use std::env;
use std::time::Duration;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use veilpool_common::{digest32, Attestation, ProofBlob, PublicInputs};

use crate::error::OracleError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9300";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Client configuration.
#[derive(Clone, Debug)]
pub struct VerifierClientConfig {
    /// Oracle base URL, without a trailing slash.
    pub base_url: String,
    /// Request timeout; also bounds health checks.
    pub timeout_secs: u64,
    /// Raw ed25519 public key of the oracle. Attestation signatures are
    /// only checked when this is set.
    pub oracle_public_key: Option<[u8; 32]>,
}

impl Default for VerifierClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            oracle_public_key: None,
        }
    }
}

impl VerifierClientConfig {
    pub fn builder() -> VerifierClientConfigBuilder {
        VerifierClientConfigBuilder::new()
    }

    /// Load configuration from `VEILPOOL_ORACLE_*` environment variables.
    pub fn from_env() -> Result<Self, OracleError> {
        let base_url =
            env::var("VEILPOOL_ORACLE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env::var("VEILPOOL_ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let oracle_public_key = match env::var("VEILPOOL_ORACLE_PUBKEY") {
            Ok(raw) => Some(parse_public_key(&raw)?),
            Err(_) => None,
        };
        Ok(Self {
            base_url,
            timeout_secs,
            oracle_public_key,
        })
    }
}

/// Builder for [`VerifierClientConfig`].
pub struct VerifierClientConfigBuilder {
    config: VerifierClientConfig,
}

impl VerifierClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: VerifierClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn oracle_public_key(mut self, key: [u8; 32]) -> Self {
        self.config.oracle_public_key = Some(key);
        self
    }

    pub fn build(self) -> VerifierClientConfig {
        self.config
    }
}

impl Default for VerifierClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct VerifyRequest {
    proof: String,
    public_inputs: String,
    verifying_key: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    is_valid: bool,
    attestation: AttestationBody,
}

/// Attestation as it appears on the wire: byte fields hex-encoded.
#[derive(Deserialize)]
struct AttestationBody {
    proof_hash: String,
    public_inputs_hash: String,
    verifying_key_hash: String,
    is_valid: bool,
    timestamp: i64,
    signature: String,
}

impl AttestationBody {
    fn into_attestation(self) -> Result<Attestation, OracleError> {
        Ok(Attestation {
            proof_hash: decode_fixed::<32>("proof_hash", &self.proof_hash)?,
            public_inputs_hash: decode_fixed::<32>("public_inputs_hash", &self.public_inputs_hash)?,
            verifying_key_hash: decode_fixed::<32>("verifying_key_hash", &self.verifying_key_hash)?,
            is_valid: self.is_valid,
            timestamp: self.timestamp,
            signature: decode_fixed::<64>("signature", &self.signature)?,
        })
    }
}

fn decode_fixed<const N: usize>(field: &str, raw: &str) -> Result<[u8; N], OracleError> {
    let bytes = hex::decode(raw)
        .map_err(|err| OracleError::InvalidResponse(format!("{field}: {err}")))?;
    bytes
        .try_into()
        .map_err(|_| OracleError::InvalidResponse(format!("{field}: expected {N} bytes")))
}

/// A transport-successful oracle answer. `is_valid = false` is a
/// definitive negative verdict, not a failure of this client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub is_valid: bool,
    pub attestation: Attestation,
}

/// Client for the verification oracle.
pub struct VerifierOracleClient {
    http: reqwest::Client,
    config: VerifierClientConfig,
}

impl VerifierOracleClient {
    pub fn new(config: VerifierClientConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OracleError::Config(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, OracleError> {
        Self::new(VerifierClientConfig::from_env()?)
    }

    pub fn config(&self) -> &VerifierClientConfig {
        &self.config
    }

    /// Probe `GET /health`. Never errors; anything but a success status
    /// within the timeout counts as unhealthy.
    pub async fn health_check(&self) -> bool {
        let url = self.endpoint("/health");
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("oracle health check failed: {err}");
                false
            }
        }
    }

    /// Poll the health endpoint until the oracle answers, waiting
    /// `poll_interval` between probes. Gives up after `max_attempts`.
    pub async fn wait_until_healthy(&self, max_attempts: u32, poll_interval: Duration) -> bool {
        for attempt in 1..=max_attempts {
            if self.health_check().await {
                return true;
            }
            if attempt < max_attempts {
                tokio::time::sleep(poll_interval).await;
            }
        }
        warn!("oracle still unhealthy after {max_attempts} probes");
        false
    }

    /// Submit a proof for verification and validate the returned
    /// attestation against the submitted material.
    pub async fn verify_proof(
        &self,
        proof: &ProofBlob,
        public_inputs: &PublicInputs,
        verifying_key: &[u8],
    ) -> Result<VerificationOutcome, OracleError> {
        let url = self.endpoint("/verify");
        let request = VerifyRequest {
            proof: hex::encode(proof.as_bytes()),
            public_inputs: hex::encode(public_inputs.as_bytes()),
            verifying_key: hex::encode(verifying_key),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| OracleError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            warn!("oracle answered {status} for {url}");
            return Err(OracleError::Http {
                status: status.as_u16(),
            });
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|err| OracleError::InvalidResponse(err.to_string()))?;
        let is_valid = body.is_valid;
        let attestation = body.attestation.into_attestation()?;

        check_binding(&attestation, proof, public_inputs, verifying_key)?;
        if let Some(key) = &self.config.oracle_public_key {
            check_signature(&attestation, key)?;
        }
        if attestation.is_valid != is_valid {
            return Err(OracleError::InvalidResponse(
                "verdict field disagrees with the attestation".to_string(),
            ));
        }

        debug!(
            "oracle verdict is_valid={is_valid} for proof {}",
            hex::encode(attestation.proof_hash)
        );
        Ok(VerificationOutcome {
            is_valid,
            attestation,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

fn check_binding(
    attestation: &Attestation,
    proof: &ProofBlob,
    public_inputs: &PublicInputs,
    verifying_key: &[u8],
) -> Result<(), OracleError> {
    if attestation.proof_hash != proof.digest()
        || attestation.public_inputs_hash != public_inputs.digest()
        || attestation.verifying_key_hash != digest32(verifying_key)
    {
        return Err(OracleError::BindingMismatch);
    }
    Ok(())
}

fn check_signature(attestation: &Attestation, key_bytes: &[u8; 32]) -> Result<(), OracleError> {
    let key = VerifyingKey::from_bytes(key_bytes)
        .map_err(|_| OracleError::Config("oracle public key is not a valid ed25519 key".into()))?;
    let signature = Signature::from_bytes(&attestation.signature);
    key.verify(&attestation.signed_bytes(), &signature)
        .map_err(|_| OracleError::BadSignature)
}

fn parse_public_key(raw: &str) -> Result<[u8; 32], OracleError> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|err| OracleError::Config(format!("VEILPOOL_ORACLE_PUBKEY: {err}")))?;
    bytes
        .try_into()
        .map_err(|_| OracleError::Config("VEILPOOL_ORACLE_PUBKEY must be 32 bytes".into()))
}
