//! Shared types for the veilpool shielded pool: fixed-size identifiers,
//! domain-separated digests, state-address derivation and the binary codec
//! for proofs, attestations and staged operation payloads.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub mod address;
pub mod codec;

pub use address::{derive_address, DerivedAddress, PoolAddresses};
pub use codec::{
    Attestation, CodecError, OperationData, ProofBlob, PublicInputs, ShieldInputs, TransferInputs,
    UnshieldInputs, ATTESTATION_LEN, PROOF_LEN,
};

/// Context string for operation-id derivation. Changing it invalidates every
/// previously derived id, so it carries an explicit version suffix.
const OPERATION_ID_CONTEXT: &str = "veilpool/operation-id/v1";

/// Compute the blake3 digest of `bytes` as a plain 32-byte array.
///
/// This is the hash used for attestation binding (proof hash, public-input
/// hash, verifying-key hash).
pub fn digest32(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// Hash `parts` under a derivation context, length-prefixing each part so
/// that `["ab", "c"]` and `["a", "bc"]` never collide.
pub(crate) fn domain_hash32(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(&(part.len() as u32).to_be_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

macro_rules! bytes32_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// All-zero value, used as a placeholder in tests and defaults.
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a hex string, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out)?;
                Ok(Self(out))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

bytes32_newtype!(
    /// Identity of a caller, note owner or payout recipient.
    AccountId
);

bytes32_newtype!(
    /// Commitment to a shielded note. Commitments are opaque to the core and
    /// only ever appended to the commitment tree, never mutated or removed.
    Commitment
);

bytes32_newtype!(
    /// Spend marker revealed when a note is consumed. A nullifier may be
    /// inserted into the spent set exactly once, globally.
    Nullifier
);

bytes32_newtype!(
    /// Deterministic identifier of a logical operation, derived from the
    /// operation's semantic parameters. Vault entries are keyed by
    /// `(AccountId, OperationId)`.
    OperationId
);

bytes32_newtype!(
    /// Derived address of a piece of pool state (pool config, commitment
    /// tree, nullifier set, vault entry, allowance, verifying key, ...).
    StateAddress
);

/// The four proof-carrying operation kinds, used as domain tags for
/// operation ids and for selecting the verifying key of the matching
/// circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Shield,
    Unshield,
    Transfer,
    TransferFrom,
}

impl OperationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::Shield => "shield",
            OperationKind::Unshield => "unshield",
            OperationKind::Transfer => "transfer",
            OperationKind::TransferFrom => "transfer_from",
        }
    }

    /// Stable 32-byte tag identifying the circuit for this operation kind.
    /// Verifying keys are registered under `(circuit_tag, version)`.
    pub fn circuit_tag(&self) -> [u8; 32] {
        blake3::derive_key("veilpool/circuit-tag/v1", self.tag().as_bytes())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl OperationId {
    /// Id of a shield operation: depositing `amount` against `commitment`.
    pub fn for_shield(commitment: &Commitment, amount: u64) -> Self {
        Self(domain_hash32(
            OPERATION_ID_CONTEXT,
            &[
                OperationKind::Shield.tag().as_bytes(),
                commitment.as_bytes(),
                &amount.to_be_bytes(),
            ],
        ))
    }

    /// Id of an unshield operation: withdrawing `amount` to `recipient`,
    /// consuming the note behind `nullifier`.
    pub fn for_unshield(nullifier: &Nullifier, amount: u64, recipient: &AccountId) -> Self {
        Self(domain_hash32(
            OPERATION_ID_CONTEXT,
            &[
                OperationKind::Unshield.tag().as_bytes(),
                nullifier.as_bytes(),
                &amount.to_be_bytes(),
                recipient.as_bytes(),
            ],
        ))
    }

    /// Id of an in-pool transfer, distinguished by the spent nullifier.
    pub fn for_transfer(nullifier: &Nullifier) -> Self {
        Self(domain_hash32(
            OPERATION_ID_CONTEXT,
            &[OperationKind::Transfer.tag().as_bytes(), nullifier.as_bytes()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_is_deterministic() {
        let c = Commitment([7u8; 32]);
        let a = OperationId::for_shield(&c, 1000);
        let b = OperationId::for_shield(&c, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn operation_id_depends_on_every_parameter() {
        let c = Commitment([7u8; 32]);
        let base = OperationId::for_shield(&c, 1000);
        assert_ne!(base, OperationId::for_shield(&c, 1001));
        assert_ne!(base, OperationId::for_shield(&Commitment([8u8; 32]), 1000));
    }

    #[test]
    fn operation_kinds_never_collide() {
        // Same 32-byte parameter under different kind tags must give
        // different ids.
        let n = Nullifier([3u8; 32]);
        let transfer = OperationId::for_transfer(&n);
        let unshield = OperationId::for_unshield(&n, 0, &AccountId::ZERO);
        assert_ne!(transfer, unshield);
    }

    #[test]
    fn hex_round_trip() {
        let c = Commitment([0xab; 32]);
        let parsed = Commitment::from_hex(&c.to_hex()).unwrap();
        assert_eq!(c, parsed);
        let prefixed = Commitment::from_hex(&format!("0x{}", c.to_hex())).unwrap();
        assert_eq!(c, prefixed);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let n = Nullifier([1u8; 32]);
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, format!("\"{}\"", n.to_hex()));
        let back: Nullifier = serde_json::from_str(&json).unwrap();
        assert_eq!(n, back);
    }

    #[test]
    fn circuit_tags_are_distinct() {
        let tags = [
            OperationKind::Shield.circuit_tag(),
            OperationKind::Unshield.circuit_tag(),
            OperationKind::Transfer.circuit_tag(),
            OperationKind::TransferFrom.circuit_tag(),
        ];
        for i in 0..tags.len() {
            for j in (i + 1)..tags.len() {
                assert_ne!(tags[i], tags[j]);
            }
        }
    }
}
