//! Binary codec for proof blobs, verifier attestations and staged
//! operation payloads.
//!
//! Every layout here is fixed-offset and byte-exact; decoding validates
//! lengths and flag bytes before any field is read, and encoding of a
//! decoded value reproduces the input byte for byte. Multi-byte integers
//! are big-endian throughout.

use thiserror::Error;

use crate::{AccountId, Commitment, Nullifier};

/// Canonical proof length: opening element (64) ‖ paired element (128) ‖
/// closing element (64), uncompressed big-endian coordinates.
pub const PROOF_LEN: usize = 256;
/// Length of the first and third proof elements.
pub const PROOF_G1_LEN: usize = 64;
/// Length of the middle proof element.
pub const PROOF_G2_LEN: usize = 128;

/// Serialized attestation length.
///
/// Layout: proof_hash (32) + public_inputs_hash (32) + verifying_key_hash
/// (32) + is_valid (1) + timestamp (8, i64 BE) + signature (64) = 169.
pub const ATTESTATION_LEN: usize = 169;
/// Length of the attestation prefix covered by the oracle's signature.
pub const ATTESTATION_SIGNED_LEN: usize = ATTESTATION_LEN - 64;

/// Size of one public-input word.
pub const WORD_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("proof blob must be {PROOF_LEN} bytes, got {0}")]
    ProofLength(usize),
    #[error("public inputs must be a non-empty multiple of {WORD_LEN} bytes, got {0}")]
    PublicInputsLength(usize),
    #[error("attestation must be {ATTESTATION_LEN} bytes, got {0}")]
    AttestationLength(usize),
    #[error("operation payload truncated: need at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("invalid attestation presence flag {0:#04x}")]
    PresenceFlag(u8),
    #[error("invalid validity byte {0:#04x}")]
    ValidityByte(u8),
    #[error("word does not encode a u64: high bytes are non-zero")]
    NonCanonicalWord,
    #[error("{kind} public inputs must be {expected} words, got {got}")]
    WordCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
}

/// A proof in its single canonical serialization. The core never inspects
/// the group elements; it only enforces the length and hashes the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ProofBlob([u8; PROOF_LEN]);

impl ProofBlob {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != PROOF_LEN {
            return Err(CodecError::ProofLength(bytes.len()));
        }
        let mut out = [0u8; PROOF_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn from_array(bytes: [u8; PROOF_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PROOF_LEN] {
        &self.0
    }

    /// blake3 digest of the serialized proof, as bound by attestations.
    pub fn digest(&self) -> [u8; 32] {
        crate::digest32(&self.0)
    }
}

impl std::fmt::Debug for ProofBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 256 bytes of hex is noise; show the binding digest instead.
        write!(f, "ProofBlob(blake3:{})", hex::encode(self.digest()))
    }
}

/// Public inputs as an opaque word-aligned buffer. Construction enforces
/// the only structural rule the core imposes: non-empty, multiple of 32.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs(Vec<u8>);

impl PublicInputs {
    pub fn new(bytes: Vec<u8>) -> Result<Self, CodecError> {
        if bytes.is_empty() || bytes.len() % WORD_LEN != 0 {
            return Err(CodecError::PublicInputsLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn from_words(words: &[[u8; WORD_LEN]]) -> Result<Self, CodecError> {
        if words.is_empty() {
            return Err(CodecError::PublicInputsLength(0));
        }
        Ok(Self::concat_words(words))
    }

    fn concat_words(words: &[[u8; WORD_LEN]]) -> Self {
        let mut bytes = Vec::with_capacity(words.len() * WORD_LEN);
        for word in words {
            bytes.extend_from_slice(word);
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.len() / WORD_LEN
    }

    pub fn word(&self, index: usize) -> Option<[u8; WORD_LEN]> {
        let start = index.checked_mul(WORD_LEN)?;
        let end = start.checked_add(WORD_LEN)?;
        if end > self.0.len() {
            return None;
        }
        let mut out = [0u8; WORD_LEN];
        out.copy_from_slice(&self.0[start..end]);
        Some(out)
    }

    /// blake3 digest of the raw buffer, as bound by attestations.
    pub fn digest(&self) -> [u8; 32] {
        crate::digest32(&self.0)
    }
}

/// Pack a u64 into a 32-byte big-endian word (left-padded with zeros).
pub fn u64_word(value: u64) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Read a u64 back out of a 32-byte word, rejecting values that overflow.
pub fn word_to_u64(word: &[u8; WORD_LEN]) -> Result<u64, CodecError> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(CodecError::NonCanonicalWord);
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// A verifier-oracle attestation over one (proof, public inputs,
/// verifying key) triple.
///
/// Holding a well-formed attestation proves nothing by itself: consumers
/// must recompute the three digests from the material they actually hold
/// and compare before trusting `is_valid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attestation {
    pub proof_hash: [u8; 32],
    pub public_inputs_hash: [u8; 32],
    pub verifying_key_hash: [u8; 32],
    pub is_valid: bool,
    /// Oracle-side unix timestamp (seconds) of the verdict.
    pub timestamp: i64,
    /// Oracle signature over the first [`ATTESTATION_SIGNED_LEN`] bytes.
    pub signature: [u8; 64],
}

impl Attestation {
    pub fn encode(&self) -> [u8; ATTESTATION_LEN] {
        let mut out = [0u8; ATTESTATION_LEN];
        out[0..32].copy_from_slice(&self.proof_hash);
        out[32..64].copy_from_slice(&self.public_inputs_hash);
        out[64..96].copy_from_slice(&self.verifying_key_hash);
        out[96] = u8::from(self.is_valid);
        out[97..105].copy_from_slice(&self.timestamp.to_be_bytes());
        out[105..].copy_from_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != ATTESTATION_LEN {
            return Err(CodecError::AttestationLength(bytes.len()));
        }
        let is_valid = match bytes[96] {
            0 => false,
            1 => true,
            other => return Err(CodecError::ValidityByte(other)),
        };
        let mut proof_hash = [0u8; 32];
        proof_hash.copy_from_slice(&bytes[0..32]);
        let mut public_inputs_hash = [0u8; 32];
        public_inputs_hash.copy_from_slice(&bytes[32..64]);
        let mut verifying_key_hash = [0u8; 32];
        verifying_key_hash.copy_from_slice(&bytes[64..96]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[97..105]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[105..]);
        Ok(Self {
            proof_hash,
            public_inputs_hash,
            verifying_key_hash,
            is_valid,
            timestamp: i64::from_be_bytes(ts),
            signature,
        })
    }

    /// The prefix the oracle signs: everything up to the signature field.
    pub fn signed_bytes(&self) -> [u8; ATTESTATION_SIGNED_LEN] {
        let mut out = [0u8; ATTESTATION_SIGNED_LEN];
        out.copy_from_slice(&self.encode()[..ATTESTATION_SIGNED_LEN]);
        out
    }
}

/// A staged operation payload: proof, optional attestation, public inputs.
///
/// Layout: presence_flag (1) + proof (256) + attestation (169, iff flag is
/// 0x01) + public_inputs (non-empty multiple of 32). Attestation presence
/// is decided by the flag byte alone, never inferred from the total length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationData {
    pub proof: ProofBlob,
    pub attestation: Option<Attestation>,
    pub public_inputs: PublicInputs,
}

impl OperationData {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            1 + PROOF_LEN
                + self.attestation.as_ref().map_or(0, |_| ATTESTATION_LEN)
                + self.public_inputs.as_bytes().len(),
        );
        out.push(u8::from(self.attestation.is_some()));
        out.extend_from_slice(self.proof.as_bytes());
        if let Some(attestation) = &self.attestation {
            out.extend_from_slice(&attestation.encode());
        }
        out.extend_from_slice(self.public_inputs.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Truncated {
                expected: 1 + PROOF_LEN + WORD_LEN,
                got: 0,
            });
        }
        let has_attestation = match bytes[0] {
            0 => false,
            1 => true,
            other => return Err(CodecError::PresenceFlag(other)),
        };
        let fixed = 1 + PROOF_LEN + if has_attestation { ATTESTATION_LEN } else { 0 };
        // The public-inputs tail must hold at least one word.
        if bytes.len() < fixed + WORD_LEN {
            return Err(CodecError::Truncated {
                expected: fixed + WORD_LEN,
                got: bytes.len(),
            });
        }
        let proof = ProofBlob::from_bytes(&bytes[1..1 + PROOF_LEN])?;
        let attestation = if has_attestation {
            Some(Attestation::decode(
                &bytes[1 + PROOF_LEN..1 + PROOF_LEN + ATTESTATION_LEN],
            )?)
        } else {
            None
        };
        let public_inputs = PublicInputs::new(bytes[fixed..].to_vec())?;
        Ok(Self {
            proof,
            attestation,
            public_inputs,
        })
    }
}

// ───────────────────────── typed input layouts ─────────────────────────
//
// The circuits expose small fixed word layouts. The core only needs the
// fields it accounts for (nullifier, commitments, disclosed amounts); the
// merkle root is carried through to the verifier untouched.

/// Shield layout: [commitment, amount].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldInputs {
    pub commitment: Commitment,
    pub amount: u64,
}

impl ShieldInputs {
    pub const WORDS: usize = 2;

    pub fn parse(inputs: &PublicInputs) -> Result<Self, CodecError> {
        expect_words("shield", inputs, Self::WORDS)?;
        Ok(Self {
            commitment: Commitment(word_at(inputs, 0)),
            amount: word_to_u64(&word_at(inputs, 1))?,
        })
    }

    pub fn encode(&self) -> PublicInputs {
        PublicInputs::concat_words(&[self.commitment.0, u64_word(self.amount)])
    }
}

/// Transfer layout: [merkle_root, nullifier, commitment_out_a,
/// commitment_out_b], plus a disclosed amount word for transfer-from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferInputs {
    pub merkle_root: [u8; 32],
    pub nullifier: Nullifier,
    pub commitment_out_a: Commitment,
    pub commitment_out_b: Commitment,
    /// Present only in the transfer-from layout (fifth word).
    pub disclosed_amount: Option<u64>,
}

impl TransferInputs {
    pub const WORDS: usize = 4;
    pub const WORDS_WITH_AMOUNT: usize = 5;

    /// Parse the four-word transfer layout.
    pub fn parse(inputs: &PublicInputs) -> Result<Self, CodecError> {
        expect_words("transfer", inputs, Self::WORDS)?;
        Ok(Self::parse_common(inputs, None))
    }

    /// Parse the five-word transfer-from layout with its disclosed amount.
    pub fn parse_with_amount(inputs: &PublicInputs) -> Result<Self, CodecError> {
        expect_words("transfer_from", inputs, Self::WORDS_WITH_AMOUNT)?;
        let amount = word_to_u64(&word_at(inputs, 4))?;
        Ok(Self::parse_common(inputs, Some(amount)))
    }

    fn parse_common(inputs: &PublicInputs, disclosed_amount: Option<u64>) -> Self {
        Self {
            merkle_root: word_at(inputs, 0),
            nullifier: Nullifier(word_at(inputs, 1)),
            commitment_out_a: Commitment(word_at(inputs, 2)),
            commitment_out_b: Commitment(word_at(inputs, 3)),
            disclosed_amount,
        }
    }

    pub fn encode(&self) -> PublicInputs {
        let mut words = vec![
            self.merkle_root,
            self.nullifier.0,
            self.commitment_out_a.0,
            self.commitment_out_b.0,
        ];
        if let Some(amount) = self.disclosed_amount {
            words.push(u64_word(amount));
        }
        PublicInputs::concat_words(&words)
    }
}

/// Unshield layout: [merkle_root, nullifier, amount, recipient].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnshieldInputs {
    pub merkle_root: [u8; 32],
    pub nullifier: Nullifier,
    pub amount: u64,
    pub recipient: AccountId,
}

impl UnshieldInputs {
    pub const WORDS: usize = 4;

    pub fn parse(inputs: &PublicInputs) -> Result<Self, CodecError> {
        expect_words("unshield", inputs, Self::WORDS)?;
        Ok(Self {
            merkle_root: word_at(inputs, 0),
            nullifier: Nullifier(word_at(inputs, 1)),
            amount: word_to_u64(&word_at(inputs, 2))?,
            recipient: AccountId(word_at(inputs, 3)),
        })
    }

    pub fn encode(&self) -> PublicInputs {
        PublicInputs::concat_words(&[
            self.merkle_root,
            self.nullifier.0,
            u64_word(self.amount),
            self.recipient.0,
        ])
    }
}

fn expect_words(
    kind: &'static str,
    inputs: &PublicInputs,
    expected: usize,
) -> Result<(), CodecError> {
    let got = inputs.word_count();
    if got != expected {
        return Err(CodecError::WordCount {
            kind,
            expected,
            got,
        });
    }
    Ok(())
}

fn word_at(inputs: &PublicInputs, index: usize) -> [u8; WORD_LEN] {
    // Callers check the word count first.
    inputs.word(index).unwrap_or([0u8; WORD_LEN])
}
