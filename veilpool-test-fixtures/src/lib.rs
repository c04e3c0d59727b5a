//! Deterministic fixtures shared by the pool and oracle test suites: a
//! fixed oracle signing key, a throwaway circuit verifying key, and
//! helpers that produce proofs and attested payloads reproducibly.

use ed25519_dalek::{Signer, SigningKey};
use once_cell::sync::OnceCell;
use veilpool_common::{digest32, Attestation, OperationData, ProofBlob, PublicInputs, PROOF_LEN};

/// Seed for the oracle signing key. Fixed so attestation bytes are stable
/// across runs.
const ORACLE_KEY_SEED: [u8; 32] = [0x42; 32];

/// Timestamp stamped on fixture attestations.
pub const ATTESTED_AT_UNIX: i64 = 1_700_000_000;

static FIXTURES: OnceCell<TestFixtures> = OnceCell::new();

/// Oracle key material and payload builders reused across tests.
pub struct TestFixtures {
    signing_key: SigningKey,
    circuit_verifying_key: Vec<u8>,
}

pub fn fixtures() -> &'static TestFixtures {
    FIXTURES.get_or_init(TestFixtures::build)
}

impl TestFixtures {
    fn build() -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&ORACLE_KEY_SEED),
            circuit_verifying_key: test_verifying_key("fixture-circuit"),
        }
    }

    /// Raw public half of the oracle signing key, as carried in oracle
    /// client configuration.
    pub fn oracle_public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The circuit verifying key fixture payloads are bound to. Register
    /// this under the active version before completing attested
    /// operations.
    pub fn circuit_verifying_key(&self) -> &[u8] {
        &self.circuit_verifying_key
    }

    /// Sign an attestation binding `proof`, `public_inputs` and
    /// `verifying_key` with the fixture oracle key.
    pub fn sign_attestation(
        &self,
        proof: &ProofBlob,
        public_inputs: &PublicInputs,
        verifying_key: &[u8],
        is_valid: bool,
        timestamp: i64,
    ) -> Attestation {
        let mut attestation = Attestation {
            proof_hash: proof.digest(),
            public_inputs_hash: public_inputs.digest(),
            verifying_key_hash: digest32(verifying_key),
            is_valid,
            timestamp,
            signature: [0u8; 64],
        };
        attestation.signature = self
            .signing_key
            .sign(&attestation.signed_bytes())
            .to_bytes();
        attestation
    }

    /// A payload whose attestation binds correctly and carries a valid
    /// verdict over the fixture circuit key.
    pub fn attested_payload(&self, proof: ProofBlob, public_inputs: PublicInputs) -> OperationData {
        let attestation = self.sign_attestation(
            &proof,
            &public_inputs,
            &self.circuit_verifying_key,
            true,
            ATTESTED_AT_UNIX,
        );
        OperationData {
            proof,
            attestation: Some(attestation),
            public_inputs,
        }
    }

    /// Same payload, but with the oracle reporting the proof invalid.
    pub fn rejected_payload(&self, proof: ProofBlob, public_inputs: PublicInputs) -> OperationData {
        let attestation = self.sign_attestation(
            &proof,
            &public_inputs,
            &self.circuit_verifying_key,
            false,
            ATTESTED_AT_UNIX,
        );
        OperationData {
            proof,
            attestation: Some(attestation),
            public_inputs,
        }
    }

    /// A payload whose attestation was signed over a different proof, so
    /// binding checks must fail.
    pub fn mismatched_payload(
        &self,
        proof: ProofBlob,
        public_inputs: PublicInputs,
    ) -> OperationData {
        let other = test_proof("some-other-proof");
        let attestation = self.sign_attestation(
            &other,
            &public_inputs,
            &self.circuit_verifying_key,
            true,
            ATTESTED_AT_UNIX,
        );
        OperationData {
            proof,
            attestation: Some(attestation),
            public_inputs,
        }
    }
}

/// Deterministic proof bytes derived from a label. Not a real proof; the
/// engine only ever hashes it.
pub fn test_proof(label: &str) -> ProofBlob {
    let mut hasher = blake3::Hasher::new_derive_key("veilpool/test-proof/v1");
    hasher.update(label.as_bytes());
    let mut bytes = [0u8; PROOF_LEN];
    hasher.finalize_xof().fill(&mut bytes);
    ProofBlob::from_array(bytes)
}

/// Deterministic verifying-key bytes derived from a label.
pub fn test_verifying_key(label: &str) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key("veilpool/test-verifying-key/v1");
    hasher.update(label.as_bytes());
    let mut bytes = vec![0u8; 64];
    hasher.finalize_xof().fill(&mut bytes);
    bytes
}
