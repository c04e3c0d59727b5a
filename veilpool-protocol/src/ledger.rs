//! The ledger collaborator.
//!
//! The core does not own durable storage; it states the access rules and
//! drives whatever store the embedder supplies through [`Ledger`]. Every
//! record class lives at a derived [`StateAddress`], and the trait surface
//! is deliberately narrow: commitments can only be appended, nullifiers
//! only inserted, verifying-key bytes never rewritten.
//!
//! [`MemoryLedger`] is the reference implementation used by tests and
//! light embedders.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use veilpool_common::{Commitment, Nullifier, StateAddress};

use crate::error::{PoolError, Result};

/// Singleton pool record, written once at engine construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub seed: [u8; 32],
    pub vk_version: u32,
}

/// Aggregate accounting for a pool's shielded value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLedger {
    /// Value currently held shielded in the pool.
    pub total_shielded: u64,
    /// Lifetime count of completed shields.
    pub deposits: u64,
    /// Lifetime count of completed unshields.
    pub withdrawals: u64,
}

/// A registered verifying key. The key bytes are immutable once written;
/// `revoked` is the only field that ever changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKeyRecord {
    pub circuit_tag: [u8; 32],
    pub version: u32,
    pub key: Vec<u8>,
    pub revoked: bool,
}

/// Whitelist entry for an external hook program. The core stores and
/// serves these; invoking hooks is the runtime's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRegistration {
    pub hook_id: [u8; 32],
    pub enabled: bool,
}

/// Typed, address-keyed access to pool state.
pub trait Ledger {
    // pool state
    fn pool_state(&self, addr: &StateAddress) -> Option<PoolState>;
    fn put_pool_state(&mut self, addr: StateAddress, state: PoolState);

    // commitment tree (append-only)
    fn append_commitment(&mut self, tree: &StateAddress, commitment: Commitment) -> u64;
    fn contains_commitment(&self, tree: &StateAddress, commitment: &Commitment) -> bool;
    fn commitment_count(&self, tree: &StateAddress) -> u64;

    // nullifier set (insert-only)
    fn is_spent(&self, set: &StateAddress, nullifier: &Nullifier) -> bool;
    fn insert_nullifier(&mut self, set: &StateAddress, nullifier: Nullifier) -> Result<()>;
    /// Insert a group of nullifiers atomically: on any error nothing is
    /// inserted.
    fn insert_nullifiers(&mut self, set: &StateAddress, nullifiers: &[Nullifier]) -> Result<()>;

    // note ledger
    fn note_ledger(&self, addr: &StateAddress) -> NoteLedger;
    fn credit_notes(&mut self, addr: &StateAddress, amount: u64) -> Result<()>;
    fn debit_notes(&mut self, addr: &StateAddress, amount: u64) -> Result<()>;

    // allowances
    fn allowance(&self, addr: &StateAddress) -> u64;
    fn set_allowance(&mut self, addr: StateAddress, amount: u64);
    fn debit_allowance(&mut self, addr: &StateAddress, amount: u64) -> Result<u64>;

    // verifying keys
    fn verifying_key(&self, addr: &StateAddress) -> Option<VerifyingKeyRecord>;
    fn register_verifying_key(
        &mut self,
        addr: StateAddress,
        record: VerifyingKeyRecord,
    ) -> Result<()>;
    /// Flip the revocation flag. Returns false when no record exists at
    /// `addr`; the caller supplies the context for the error.
    fn revoke_verifying_key(&mut self, addr: &StateAddress) -> bool;

    // hooks
    fn hook(&self, addr: &StateAddress) -> Option<HookRegistration>;
    fn set_hook(&mut self, addr: StateAddress, registration: HookRegistration);
}

#[derive(Clone, Debug, Default)]
struct CommitmentTree {
    leaves: Vec<Commitment>,
    index: HashSet<Commitment>,
}

/// Hash-map ledger for tests and in-process embedding.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    pool_states: HashMap<StateAddress, PoolState>,
    trees: HashMap<StateAddress, CommitmentTree>,
    nullifiers: HashMap<StateAddress, HashSet<Nullifier>>,
    notes: HashMap<StateAddress, NoteLedger>,
    allowances: HashMap<StateAddress, u64>,
    verifying_keys: HashMap<StateAddress, VerifyingKeyRecord>,
    hooks: HashMap<StateAddress, HookRegistration>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn pool_state(&self, addr: &StateAddress) -> Option<PoolState> {
        self.pool_states.get(addr).cloned()
    }

    fn put_pool_state(&mut self, addr: StateAddress, state: PoolState) {
        self.pool_states.insert(addr, state);
    }

    fn append_commitment(&mut self, tree: &StateAddress, commitment: Commitment) -> u64 {
        let tree = self.trees.entry(*tree).or_default();
        tree.leaves.push(commitment);
        tree.index.insert(commitment);
        (tree.leaves.len() - 1) as u64
    }

    fn contains_commitment(&self, tree: &StateAddress, commitment: &Commitment) -> bool {
        self.trees
            .get(tree)
            .map(|t| t.index.contains(commitment))
            .unwrap_or(false)
    }

    fn commitment_count(&self, tree: &StateAddress) -> u64 {
        self.trees.get(tree).map(|t| t.leaves.len() as u64).unwrap_or(0)
    }

    fn is_spent(&self, set: &StateAddress, nullifier: &Nullifier) -> bool {
        self.nullifiers
            .get(set)
            .map(|s| s.contains(nullifier))
            .unwrap_or(false)
    }

    fn insert_nullifier(&mut self, set: &StateAddress, nullifier: Nullifier) -> Result<()> {
        let set = self.nullifiers.entry(*set).or_default();
        if !set.insert(nullifier) {
            return Err(PoolError::NullifierAlreadyUsed(nullifier));
        }
        Ok(())
    }

    fn insert_nullifiers(&mut self, set_addr: &StateAddress, nullifiers: &[Nullifier]) -> Result<()> {
        let set = self.nullifiers.entry(*set_addr).or_default();
        // Validate the whole group before touching the set.
        let mut staged = HashSet::with_capacity(nullifiers.len());
        for nullifier in nullifiers {
            if set.contains(nullifier) {
                return Err(PoolError::NullifierAlreadyUsed(*nullifier));
            }
            if !staged.insert(*nullifier) {
                return Err(PoolError::DuplicateNullifier(*nullifier));
            }
        }
        set.extend(staged);
        Ok(())
    }

    fn note_ledger(&self, addr: &StateAddress) -> NoteLedger {
        self.notes.get(addr).copied().unwrap_or_default()
    }

    fn credit_notes(&mut self, addr: &StateAddress, amount: u64) -> Result<()> {
        let ledger = self.notes.entry(*addr).or_default();
        ledger.total_shielded = ledger
            .total_shielded
            .checked_add(amount)
            .ok_or(PoolError::ValueOverflow)?;
        ledger.deposits += 1;
        Ok(())
    }

    fn debit_notes(&mut self, addr: &StateAddress, amount: u64) -> Result<()> {
        let ledger = self.notes.entry(*addr).or_default();
        ledger.total_shielded =
            ledger
                .total_shielded
                .checked_sub(amount)
                .ok_or(PoolError::InsufficientPoolBalance {
                    balance: ledger.total_shielded,
                    requested: amount,
                })?;
        ledger.withdrawals += 1;
        Ok(())
    }

    fn allowance(&self, addr: &StateAddress) -> u64 {
        self.allowances.get(addr).copied().unwrap_or(0)
    }

    fn set_allowance(&mut self, addr: StateAddress, amount: u64) {
        self.allowances.insert(addr, amount);
    }

    fn debit_allowance(&mut self, addr: &StateAddress, amount: u64) -> Result<u64> {
        let remaining = self.allowances.entry(*addr).or_insert(0);
        *remaining = remaining
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientAllowance {
                remaining: *remaining,
                requested: amount,
            })?;
        Ok(*remaining)
    }

    fn verifying_key(&self, addr: &StateAddress) -> Option<VerifyingKeyRecord> {
        self.verifying_keys.get(addr).cloned()
    }

    fn register_verifying_key(
        &mut self,
        addr: StateAddress,
        record: VerifyingKeyRecord,
    ) -> Result<()> {
        if let Some(existing) = self.verifying_keys.get(&addr) {
            return Err(PoolError::VerifyingKeyExists {
                circuit: hex::encode(existing.circuit_tag),
                version: existing.version,
            });
        }
        self.verifying_keys.insert(addr, record);
        Ok(())
    }

    fn revoke_verifying_key(&mut self, addr: &StateAddress) -> bool {
        match self.verifying_keys.get_mut(addr) {
            Some(record) => {
                record.revoked = true;
                true
            }
            None => false,
        }
    }

    fn hook(&self, addr: &StateAddress) -> Option<HookRegistration> {
        self.hooks.get(addr).copied()
    }

    fn set_hook(&mut self, addr: StateAddress, registration: HookRegistration) {
        self.hooks.insert(addr, registration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> StateAddress {
        StateAddress([byte; 32])
    }

    #[test]
    fn commitments_append_in_order() {
        let mut ledger = MemoryLedger::new();
        let tree = addr(1);
        assert_eq!(ledger.append_commitment(&tree, Commitment([1u8; 32])), 0);
        assert_eq!(ledger.append_commitment(&tree, Commitment([2u8; 32])), 1);
        assert_eq!(ledger.commitment_count(&tree), 2);
        assert!(ledger.contains_commitment(&tree, &Commitment([1u8; 32])));
        assert!(!ledger.contains_commitment(&tree, &Commitment([9u8; 32])));
    }

    #[test]
    fn second_nullifier_insert_fails() {
        let mut ledger = MemoryLedger::new();
        let set = addr(2);
        let n = Nullifier([5u8; 32]);
        ledger.insert_nullifier(&set, n).unwrap();
        assert_eq!(
            ledger.insert_nullifier(&set, n),
            Err(PoolError::NullifierAlreadyUsed(n))
        );
    }

    #[test]
    fn bulk_insert_is_all_or_nothing() {
        let mut ledger = MemoryLedger::new();
        let set = addr(3);
        let spent = Nullifier([1u8; 32]);
        ledger.insert_nullifier(&set, spent).unwrap();

        let fresh_a = Nullifier([2u8; 32]);
        let fresh_b = Nullifier([3u8; 32]);
        let err = ledger
            .insert_nullifiers(&set, &[fresh_a, fresh_b, spent])
            .unwrap_err();
        assert_eq!(err, PoolError::NullifierAlreadyUsed(spent));
        // The fresh ones must not have leaked in.
        assert!(!ledger.is_spent(&set, &fresh_a));
        assert!(!ledger.is_spent(&set, &fresh_b));

        ledger.insert_nullifiers(&set, &[fresh_a, fresh_b]).unwrap();
        assert!(ledger.is_spent(&set, &fresh_a));
        assert!(ledger.is_spent(&set, &fresh_b));
    }

    #[test]
    fn bulk_insert_rejects_in_group_duplicates() {
        let mut ledger = MemoryLedger::new();
        let set = addr(4);
        let n = Nullifier([7u8; 32]);
        let err = ledger
            .insert_nullifiers(&set, &[n, Nullifier([8u8; 32]), n])
            .unwrap_err();
        assert_eq!(err, PoolError::DuplicateNullifier(n));
        assert!(!ledger.is_spent(&set, &n));
    }

    #[test]
    fn note_ledger_tracks_value_and_counts() {
        let mut ledger = MemoryLedger::new();
        let notes = addr(5);
        ledger.credit_notes(&notes, 1_000).unwrap();
        ledger.credit_notes(&notes, 500).unwrap();
        ledger.debit_notes(&notes, 300).unwrap();
        let snapshot = ledger.note_ledger(&notes);
        assert_eq!(snapshot.total_shielded, 1_200);
        assert_eq!(snapshot.deposits, 2);
        assert_eq!(snapshot.withdrawals, 1);

        let err = ledger.debit_notes(&notes, 5_000).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientPoolBalance {
                balance: 1_200,
                requested: 5_000
            }
        );
    }

    #[test]
    fn allowance_never_goes_negative() {
        let mut ledger = MemoryLedger::new();
        let allowance = addr(6);
        ledger.set_allowance(allowance, 100);
        assert_eq!(ledger.debit_allowance(&allowance, 60).unwrap(), 40);
        let err = ledger.debit_allowance(&allowance, 41).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientAllowance {
                remaining: 40,
                requested: 41
            }
        );
        assert_eq!(ledger.allowance(&allowance), 40);
    }

    #[test]
    fn verifying_keys_are_write_once() {
        let mut ledger = MemoryLedger::new();
        let vk_addr = addr(7);
        let record = VerifyingKeyRecord {
            circuit_tag: [1u8; 32],
            version: 1,
            key: vec![1, 2, 3],
            revoked: false,
        };
        ledger.register_verifying_key(vk_addr, record.clone()).unwrap();
        let err = ledger
            .register_verifying_key(vk_addr, record)
            .unwrap_err();
        assert!(matches!(err, PoolError::VerifyingKeyExists { .. }));

        assert!(ledger.revoke_verifying_key(&vk_addr));
        assert!(ledger.verifying_key(&vk_addr).unwrap().revoked);
        assert!(!ledger.revoke_verifying_key(&addr(8)));
    }
}
