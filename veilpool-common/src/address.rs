//! Deterministic state-address derivation.
//!
//! Every piece of pool state lives at an address derived from a class tag
//! and the components that identify the record within its class. Derivation
//! is a pure function of its inputs: no randomness, no clock, no failure
//! path. The auxiliary discriminator byte travels with the address so that
//! runtimes which need a one-byte disambiguator (account seeds, storage
//! prefixes) do not have to re-derive it.

use crate::{AccountId, Commitment, Nullifier, OperationId, StateAddress};
use serde::{Deserialize, Serialize};

/// Derivation context. Versioned: bumping it moves every address.
const ADDRESS_CONTEXT: &str = "veilpool/state-address/v1";

/// Class tag for the singleton pool configuration record.
pub const TAG_POOL_STATE: &str = "pool-state";
/// Class tag for the append-only commitment tree.
pub const TAG_COMMITMENT_TREE: &str = "commitment-tree";
/// Class tag for the global spent-nullifier set.
pub const TAG_NULLIFIER_SET: &str = "nullifier-set";
/// Class tag for the pool's note ledger (total shielded value).
pub const TAG_NOTE_LEDGER: &str = "note-ledger";
/// Class tag for hook whitelist records.
pub const TAG_HOOK_CONFIG: &str = "hook-config";
/// Class tag for staged proof-vault entries.
pub const TAG_PROOF_VAULT: &str = "proof-vault";
/// Class tag for allowance records.
pub const TAG_ALLOWANCE: &str = "allowance";
/// Class tag for verifying-key records.
pub const TAG_VERIFYING_KEY: &str = "verifying-key";

/// A derived address together with its auxiliary discriminator byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub address: StateAddress,
    pub discriminator: u8,
}

/// Derive the address of the state record identified by `tag` and
/// `components`.
///
/// The tag and each component are length-prefixed before being absorbed, so
/// distinct component splits can never produce the same digest. The first 32
/// bytes of the extended output form the address; the 33rd byte is the
/// discriminator.
pub fn derive_address(tag: &str, components: &[&[u8]]) -> DerivedAddress {
    let mut hasher = blake3::Hasher::new_derive_key(ADDRESS_CONTEXT);
    let mut absorb = |part: &[u8]| {
        hasher.update(&(part.len() as u32).to_be_bytes());
        hasher.update(part);
    };
    absorb(tag.as_bytes());
    for component in components {
        absorb(component);
    }
    let mut out = [0u8; 33];
    hasher.finalize_xof().fill(&mut out);
    let mut address = [0u8; 32];
    address.copy_from_slice(&out[..32]);
    DerivedAddress {
        address: StateAddress(address),
        discriminator: out[32],
    }
}

/// Address of the vault entry staged by `user` for `operation_id`.
pub fn vault_entry_address(user: &AccountId, operation_id: &OperationId) -> DerivedAddress {
    derive_address(TAG_PROOF_VAULT, &[user.as_bytes(), operation_id.as_bytes()])
}

/// Address of the allowance record `(owner, spender)` within `pool`.
pub fn allowance_address(
    pool: &StateAddress,
    owner: &AccountId,
    spender: &AccountId,
) -> DerivedAddress {
    derive_address(
        TAG_ALLOWANCE,
        &[pool.as_bytes(), owner.as_bytes(), spender.as_bytes()],
    )
}

/// Address of the verifying-key record for `(circuit_tag, version)`.
pub fn verifying_key_address(circuit_tag: &[u8; 32], version: u32) -> DerivedAddress {
    derive_address(TAG_VERIFYING_KEY, &[circuit_tag, &version.to_be_bytes()])
}

/// Address of the hook registration `hook_id` within `pool`.
pub fn hook_address(pool: &StateAddress, hook_id: &[u8; 32]) -> DerivedAddress {
    derive_address(TAG_HOOK_CONFIG, &[pool.as_bytes(), hook_id])
}

/// The per-pool singleton addresses, derived once from the pool seed at
/// engine construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAddresses {
    pub pool_state: StateAddress,
    pub commitment_tree: StateAddress,
    pub nullifier_set: StateAddress,
    pub note_ledger: StateAddress,
}

impl PoolAddresses {
    pub fn derive(pool_seed: &[u8; 32]) -> Self {
        Self {
            pool_state: derive_address(TAG_POOL_STATE, &[pool_seed]).address,
            commitment_tree: derive_address(TAG_COMMITMENT_TREE, &[pool_seed]).address,
            nullifier_set: derive_address(TAG_NULLIFIER_SET, &[pool_seed]).address,
            note_ledger: derive_address(TAG_NOTE_LEDGER, &[pool_seed]).address,
        }
    }
}

/// Commit to a note's public opening. Used by tests and fixtures to build
/// commitments the same way wallets do; the core itself treats commitments
/// as opaque.
pub fn note_commitment(owner: &AccountId, amount: u64, blinding: &[u8; 32]) -> Commitment {
    Commitment(crate::domain_hash32(
        "veilpool/note-commitment/v1",
        &[owner.as_bytes(), &amount.to_be_bytes(), blinding],
    ))
}

/// Derive the nullifier that spends the note behind `commitment` with the
/// holder's `spend_secret`. Same caveat as [`note_commitment`]: a
/// convenience for tests and fixtures, opaque to the core.
pub fn note_nullifier(commitment: &Commitment, spend_secret: &[u8; 32]) -> Nullifier {
    Nullifier(crate::domain_hash32(
        "veilpool/nullifier/v1",
        &[commitment.as_bytes(), spend_secret],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_address(TAG_POOL_STATE, &[b"pool-1"]);
        let b = derive_address(TAG_POOL_STATE, &[b"pool-1"]);
        assert_eq!(a, b);
    }

    #[test]
    fn any_changed_component_moves_the_address() {
        let base = derive_address(TAG_ALLOWANCE, &[b"pool", b"owner", b"spender"]);
        let other_owner = derive_address(TAG_ALLOWANCE, &[b"pool", b"ownex", b"spender"]);
        let other_tag = derive_address(TAG_NOTE_LEDGER, &[b"pool", b"owner", b"spender"]);
        assert_ne!(base.address, other_owner.address);
        assert_ne!(base.address, other_tag.address);
    }

    #[test]
    fn component_splits_do_not_collide() {
        let joined = derive_address(TAG_POOL_STATE, &[b"abcd"]);
        let split = derive_address(TAG_POOL_STATE, &[b"ab", b"cd"]);
        assert_ne!(joined.address, split.address);
    }

    #[test]
    fn discriminator_is_stable() {
        let user = AccountId([1u8; 32]);
        let op = OperationId([2u8; 32]);
        let first = vault_entry_address(&user, &op);
        let second = vault_entry_address(&user, &op);
        assert_eq!(first.discriminator, second.discriminator);
    }

    #[test]
    fn pool_addresses_are_pairwise_distinct() {
        let addrs = PoolAddresses::derive(&[9u8; 32]);
        let all = [
            addrs.pool_state,
            addrs.commitment_tree,
            addrs.nullifier_set,
            addrs.note_ledger,
        ];
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j]);
            }
        }
    }
}
