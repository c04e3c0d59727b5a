//! The operation vault: staged state for phased operations.
//!
//! Entries are keyed by `(user, operation id)` and hold everything a
//! later phase needs: the semantic parameters recorded at prepare, the
//! staged proof payload, and the current phase. The vault is the core's
//! own mutable region (the ledger being the other); a single writer
//! drives it, so plain maps suffice.

use std::collections::HashMap;

use veilpool_common::{
    address::vault_entry_address, AccountId, Commitment, DerivedAddress, Nullifier, OperationData,
    OperationId, OperationKind,
};

use crate::error::{PoolError, Result};
use crate::phase::Phase;

/// Semantic parameters of a phased operation, fixed at prepare time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationParams {
    Shield {
        commitment: Commitment,
        amount: u64,
    },
    Unshield {
        nullifier: Nullifier,
        amount: u64,
        recipient: AccountId,
    },
}

impl OperationParams {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationParams::Shield { .. } => OperationKind::Shield,
            OperationParams::Unshield { .. } => OperationKind::Unshield,
        }
    }

    /// The operation id these parameters derive to. Identical parameters
    /// always map to the same id.
    pub fn operation_id(&self) -> OperationId {
        match self {
            OperationParams::Shield { commitment, amount } => {
                OperationId::for_shield(commitment, *amount)
            }
            OperationParams::Unshield {
                nullifier,
                amount,
                recipient,
            } => OperationId::for_unshield(nullifier, *amount, recipient),
        }
    }
}

/// One staged operation.
#[derive(Clone, Debug)]
pub struct VaultEntry {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub phase: Phase,
    pub params: OperationParams,
    pub staged: Option<OperationData>,
    /// Whether verification came from a bound oracle attestation (true)
    /// or the independent verifier fallback (false). Meaningful once the
    /// entry has passed its verify step.
    pub attested: bool,
    /// Unix seconds at prepare time; drives TTL expiry.
    pub created_at: i64,
    /// Derived address of this entry, for external indexing.
    pub address: DerivedAddress,
}

/// Map of staged operations with the phase rules enforced on every
/// mutation.
#[derive(Debug, Default)]
pub struct OperationVault {
    entries: HashMap<(AccountId, OperationId), VaultEntry>,
}

impl OperationVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, user: &AccountId, id: &OperationId) -> Option<&VaultEntry> {
        self.entries.get(&(*user, *id))
    }

    pub(crate) fn entry_mut(
        &mut self,
        user: &AccountId,
        id: &OperationId,
    ) -> Result<&mut VaultEntry> {
        self.entries
            .get_mut(&(*user, *id))
            .ok_or(PoolError::NotFound(*id))
    }

    /// Create an entry in `Prepared`. Fails with `AlreadyExists` when the
    /// same user already has an entry for the derived id.
    pub fn prepare(
        &mut self,
        user: AccountId,
        params: OperationParams,
        now: i64,
    ) -> Result<OperationId> {
        let id = params.operation_id();
        if self.entries.contains_key(&(user, id)) {
            return Err(PoolError::AlreadyExists(id));
        }
        let entry = VaultEntry {
            operation_id: id,
            kind: params.kind(),
            phase: Phase::Prepared,
            params,
            staged: None,
            attested: false,
            created_at: now,
            address: vault_entry_address(&user, &id),
        };
        tracing::debug!("prepared {} operation {id} for user {user}", entry.kind);
        self.entries.insert((user, id), entry);
        Ok(id)
    }

    /// Stage (or restage) the proof payload. Legal in `Prepared`, which
    /// moves the entry to `DataStaged`, and in `DataStaged`, which
    /// replaces the payload.
    pub fn stage_data(
        &mut self,
        user: &AccountId,
        id: &OperationId,
        data: OperationData,
    ) -> Result<()> {
        let entry = self.entry_mut(user, id)?;
        match entry.phase {
            Phase::Prepared => entry.phase = Phase::DataStaged,
            Phase::DataStaged => {}
            actual => {
                return Err(PoolError::InvalidPhase {
                    operation: *id,
                    expected: Phase::Prepared,
                    actual,
                })
            }
        }
        entry.staged = Some(data);
        tracing::debug!("staged payload for operation {id}");
        Ok(())
    }

    /// Advance the entry a single step to `to`. Any skip, repeat or
    /// backward move is an `InvalidPhase`.
    pub fn advance(&mut self, user: &AccountId, id: &OperationId, to: Phase) -> Result<()> {
        let entry = self.entry_mut(user, id)?;
        if !entry.phase.can_advance_to(to) {
            return Err(PoolError::InvalidPhase {
                operation: *id,
                expected: to.prev().unwrap_or(to),
                actual: entry.phase,
            });
        }
        tracing::debug!("operation {id}: {} -> {to}", entry.phase);
        entry.phase = to;
        Ok(())
    }

    /// Remove the entry. Idempotent: finalizing an absent entry is a
    /// no-op, so retries after a crash or duplicate delivery are safe.
    pub fn finalize(&mut self, user: &AccountId, id: &OperationId) -> bool {
        let removed = self.entries.remove(&(*user, *id)).is_some();
        if removed {
            tracing::debug!("finalized operation {id}");
        }
        removed
    }

    /// Sweep entries older than `ttl_secs`, returning the removed keys.
    /// Callers decide when to sweep; nothing runs in the background.
    pub fn expire_stale(&mut self, now: i64, ttl_secs: i64) -> Vec<(AccountId, OperationId)> {
        let cutoff = now.saturating_sub(ttl_secs);
        let stale: Vec<(AccountId, OperationId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.created_at < cutoff)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            if let Some(entry) = self.entries.remove(key) {
                tracing::info!(
                    "expired operation {} in phase {} (staged at {})",
                    entry.operation_id,
                    entry.phase,
                    entry.created_at
                );
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilpool_common::{PublicInputs, ProofBlob};

    fn user() -> AccountId {
        AccountId([1u8; 32])
    }

    fn unshield_params() -> OperationParams {
        OperationParams::Unshield {
            nullifier: Nullifier([2u8; 32]),
            amount: 750,
            recipient: AccountId([3u8; 32]),
        }
    }

    fn payload() -> OperationData {
        OperationData {
            proof: ProofBlob::from_array([0u8; 256]),
            attestation: None,
            public_inputs: PublicInputs::new(vec![0u8; 32]).unwrap(),
        }
    }

    #[test]
    fn prepare_twice_collides() {
        let mut vault = OperationVault::new();
        let id = vault.prepare(user(), unshield_params(), 100).unwrap();
        let err = vault.prepare(user(), unshield_params(), 200).unwrap_err();
        assert_eq!(err, PoolError::AlreadyExists(id));
    }

    #[test]
    fn same_params_different_users_do_not_collide() {
        let mut vault = OperationVault::new();
        vault.prepare(user(), unshield_params(), 100).unwrap();
        vault
            .prepare(AccountId([9u8; 32]), unshield_params(), 100)
            .unwrap();
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn stage_requires_an_entry() {
        let mut vault = OperationVault::new();
        let id = OperationId([4u8; 32]);
        let err = vault.stage_data(&user(), &id, payload()).unwrap_err();
        assert_eq!(err, PoolError::NotFound(id));
    }

    #[test]
    fn restaging_replaces_the_payload() {
        let mut vault = OperationVault::new();
        let id = vault.prepare(user(), unshield_params(), 100).unwrap();
        vault.stage_data(&user(), &id, payload()).unwrap();
        let mut second = payload();
        second.public_inputs = PublicInputs::new(vec![7u8; 64]).unwrap();
        vault.stage_data(&user(), &id, second.clone()).unwrap();
        let entry = vault.get(&user(), &id).unwrap();
        assert_eq!(entry.phase, Phase::DataStaged);
        assert_eq!(entry.staged.as_ref(), Some(&second));
    }

    #[test]
    fn every_out_of_order_advance_fails() {
        let mut vault = OperationVault::new();
        let id = vault.prepare(user(), unshield_params(), 100).unwrap();
        vault.stage_data(&user(), &id, payload()).unwrap();
        // Entry sits in DataStaged; the only legal step is Verified.
        for to in Phase::ALL {
            let result = vault.advance(&user(), &id, to);
            if to == Phase::Verified {
                assert!(result.is_ok());
                // Walk back for the next round of the loop by rebuilding.
                vault.finalize(&user(), &id);
                vault.prepare(user(), unshield_params(), 100).unwrap();
                vault.stage_data(&user(), &id, payload()).unwrap();
            } else {
                assert!(
                    matches!(result, Err(PoolError::InvalidPhase { .. })),
                    "advance to {to} should fail from DataStaged"
                );
            }
        }
    }

    #[test]
    fn staging_after_verification_is_rejected() {
        let mut vault = OperationVault::new();
        let id = vault.prepare(user(), unshield_params(), 100).unwrap();
        vault.stage_data(&user(), &id, payload()).unwrap();
        vault.advance(&user(), &id, Phase::Verified).unwrap();
        let err = vault.stage_data(&user(), &id, payload()).unwrap_err();
        assert_eq!(
            err,
            PoolError::InvalidPhase {
                operation: id,
                expected: Phase::Prepared,
                actual: Phase::Verified
            }
        );
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut vault = OperationVault::new();
        let id = vault.prepare(user(), unshield_params(), 100).unwrap();
        assert!(vault.finalize(&user(), &id));
        assert!(!vault.finalize(&user(), &id));
        assert!(vault.is_empty());
    }

    #[test]
    fn expiry_sweeps_only_stale_entries() {
        let mut vault = OperationVault::new();
        let old = vault.prepare(user(), unshield_params(), 1_000).unwrap();
        let fresh_params = OperationParams::Shield {
            commitment: Commitment([8u8; 32]),
            amount: 10,
        };
        let fresh = vault.prepare(user(), fresh_params, 90_000).unwrap();

        let swept = vault.expire_stale(100_000, 86_400);
        assert_eq!(swept, vec![(user(), old)]);
        assert!(vault.get(&user(), &old).is_none());
        assert!(vault.get(&user(), &fresh).is_some());
    }
}
