//! The execution engine: one [`ShieldedPool`] per pool instance.
//!
//! The engine owns the vault and drives the ledger; every state change
//! enters through [`ShieldedPool::execute`] with a typed instruction and
//! leaves as a typed receipt. Calls are sequential and atomic: all checks
//! run before the first mutation, so a failed call leaves both the vault
//! and the ledger untouched.
//!
//! The engine does no I/O. Proof verification arrives either as an oracle
//! attestation staged inside the payload (whose binding hashes are
//! recomputed here, never trusted) or through an injected
//! [`ProofVerifier`] for payloads without one.

use std::time::{SystemTime, UNIX_EPOCH};

use veilpool_common::{
    address::{allowance_address, hook_address, verifying_key_address},
    digest32, AccountId, Commitment, Nullifier, OperationData, OperationId, OperationKind,
    PoolAddresses, ProofBlob, PublicInputs, ShieldInputs, TransferInputs, UnshieldInputs,
};

use crate::batch::{self, BatchItem};
use crate::budget::{
    CallMeter, UsageReporter, COST_APPROVE, COST_BATCH_OVERHEAD, COST_FINALIZE,
    COST_REGISTRY_WRITE, COST_STAGE_DATA, COST_STATE_APPLY, COST_VAULT_PREPARE,
};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::instructions::{Instruction, Receipt};
use crate::ledger::{HookRegistration, Ledger, PoolState, VerifyingKeyRecord};
use crate::phase::Phase;
use crate::vault::{OperationParams, OperationVault, VaultEntry};

/// Independent proof verification, used for payloads staged without an
/// attestation. Implementations are injected at construction; the engine
/// ships none of its own.
pub trait ProofVerifier {
    fn verify(&self, proof: &ProofBlob, public_inputs: &PublicInputs, verifying_key: &[u8])
        -> bool;
}

/// One pool instance: configuration, derived addresses, vault and ledger.
pub struct ShieldedPool<L: Ledger, R: UsageReporter> {
    config: PoolConfig,
    addresses: PoolAddresses,
    ledger: L,
    vault: OperationVault,
    reporter: R,
    verifier: Option<Box<dyn ProofVerifier + Send + Sync>>,
}

impl<L: Ledger, R: UsageReporter> ShieldedPool<L, R> {
    /// Build the engine and write the pool's singleton record if the
    /// ledger does not hold one yet.
    pub fn new(config: PoolConfig, mut ledger: L, reporter: R) -> Self {
        let addresses = PoolAddresses::derive(&config.pool_seed);
        if ledger.pool_state(&addresses.pool_state).is_none() {
            ledger.put_pool_state(
                addresses.pool_state,
                PoolState {
                    seed: config.pool_seed,
                    vk_version: config.vk_version,
                },
            );
        }
        Self {
            config,
            addresses,
            ledger,
            vault: OperationVault::new(),
            reporter,
            verifier: None,
        }
    }

    /// Attach an independent verifier for payloads without an attestation.
    pub fn with_verifier(
        mut self,
        verifier: impl ProofVerifier + Send + Sync + 'static,
    ) -> Self {
        self.verifier = Some(Box::new(verifier));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn addresses(&self) -> &PoolAddresses {
        &self.addresses
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn vault(&self) -> &OperationVault {
        &self.vault
    }

    /// Execute one instruction as `caller`, stamped with the current
    /// wall-clock time.
    pub fn execute(&mut self, caller: AccountId, instruction: Instruction) -> Result<Receipt> {
        self.execute_at(caller, instruction, unix_now())
    }

    /// Execute one instruction with an explicit timestamp. Consumption is
    /// reported whether the call succeeds or fails.
    pub fn execute_at(
        &mut self,
        caller: AccountId,
        instruction: Instruction,
        now: i64,
    ) -> Result<Receipt> {
        let label = instruction.name();
        let mut meter = CallMeter::new(self.config.compute_ceiling);
        let result = self.dispatch(caller, instruction, now, &mut meter);
        self.reporter.record(label, meter.used());
        if let Err(err) = &result {
            tracing::debug!("{label} rejected: {err}");
        }
        result
    }

    /// Sweep vault entries older than the configured TTL.
    pub fn expire_stale(&mut self, now: i64) -> Vec<(AccountId, OperationId)> {
        self.vault.expire_stale(now, self.config.vault_ttl_secs)
    }

    /// Whitelist (or delist) an external hook program for this pool.
    pub fn register_hook(&mut self, hook_id: [u8; 32], enabled: bool) {
        let addr = hook_address(&self.addresses.pool_state, &hook_id).address;
        self.ledger
            .set_hook(addr, HookRegistration { hook_id, enabled });
    }

    pub fn hook_enabled(&self, hook_id: &[u8; 32]) -> bool {
        let addr = hook_address(&self.addresses.pool_state, hook_id).address;
        self.ledger.hook(&addr).map(|h| h.enabled).unwrap_or(false)
    }

    fn dispatch(
        &mut self,
        caller: AccountId,
        instruction: Instruction,
        now: i64,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        match instruction {
            Instruction::ShieldPrepare { amount, commitment } => {
                self.shield_prepare(caller, amount, commitment, now, meter)
            }
            Instruction::ShieldStageData { operation_id, data } => {
                self.stage_payload(caller, operation_id, &data, OperationKind::Shield, meter)
            }
            Instruction::ShieldComplete { operation_id } => {
                self.shield_complete(caller, operation_id, meter)
            }
            Instruction::UnshieldPrepare {
                nullifier,
                amount,
                recipient,
            } => self.unshield_prepare(caller, nullifier, amount, recipient, now, meter),
            Instruction::UnshieldStageData { operation_id, data } => {
                self.stage_payload(caller, operation_id, &data, OperationKind::Unshield, meter)
            }
            Instruction::UnshieldVerify { operation_id } => {
                self.unshield_verify(caller, operation_id, meter)
            }
            Instruction::UnshieldApply { operation_id } => {
                self.unshield_apply(caller, operation_id, meter)
            }
            Instruction::UnshieldComplete { operation_id } => {
                self.unshield_complete(caller, operation_id, meter)
            }
            Instruction::Transfer { data } => self.transfer(caller, &data, meter),
            Instruction::TransferFrom {
                owner,
                amount,
                data,
            } => self.transfer_from(caller, owner, amount, &data, meter),
            Instruction::Approve { spender, amount } => {
                self.approve(caller, spender, amount, meter)
            }
            Instruction::BatchTransfer { items } => self.batch_transfer(caller, &items, meter),
            Instruction::BatchTransferFrom { owner, items } => {
                self.batch_transfer_from(caller, owner, &items, meter)
            }
            Instruction::RegisterVerifyingKey {
                circuit,
                version,
                key,
            } => self.register_verifying_key(circuit, version, key, meter),
            Instruction::RevokeVerifyingKey { circuit, version } => {
                self.revoke_verifying_key(circuit, version, meter)
            }
        }
    }

    // ───────────────────────── shield ─────────────────────────

    fn shield_prepare(
        &mut self,
        caller: AccountId,
        amount: u64,
        commitment: Commitment,
        now: i64,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_VAULT_PREPARE)?;
        let operation_id =
            self.vault
                .prepare(caller, OperationParams::Shield { commitment, amount }, now)?;
        Ok(Receipt::ShieldPrepared { operation_id })
    }

    fn shield_complete(
        &mut self,
        caller: AccountId,
        operation_id: OperationId,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        let (commitment, amount) = {
            let entry = self.expect_entry(&caller, &operation_id, OperationKind::Shield)?;
            let (commitment, amount) = match entry.params {
                OperationParams::Shield { commitment, amount } => (commitment, amount),
                _ => return Err(PoolError::NotFound(operation_id)),
            };
            match entry.phase {
                // Bare deposit: the commitment is inserted as-is.
                Phase::Prepared => {}
                // Attested deposit: the staged payload must bind to the
                // prepared parameters before anything is inserted.
                Phase::DataStaged => {
                    meter.charge(self.config.per_item_cost)?;
                    let staged = staged_payload(entry)?;
                    let parsed = ShieldInputs::parse(&staged.public_inputs)?;
                    if parsed.commitment != commitment || parsed.amount != amount {
                        return Err(PoolError::ProofRejected {
                            reason: "staged public inputs do not match the prepared shield"
                                .into(),
                        });
                    }
                    self.check_payload(OperationKind::Shield, staged)?;
                }
                actual => {
                    return Err(PoolError::InvalidPhase {
                        operation: operation_id,
                        expected: Phase::Prepared,
                        actual,
                    })
                }
            }
            (commitment, amount)
        };

        meter.charge(COST_STATE_APPLY + COST_FINALIZE)?;
        let leaf_index = self
            .ledger
            .append_commitment(&self.addresses.commitment_tree, commitment);
        self.ledger
            .credit_notes(&self.addresses.note_ledger, amount)?;
        self.vault.finalize(&caller, &operation_id);
        tracing::info!(
            "shield completed: {amount} units behind commitment {commitment} (leaf {leaf_index})"
        );
        Ok(Receipt::ShieldCompleted {
            operation_id,
            commitment,
            leaf_index,
        })
    }

    // ───────────────────────── unshield ─────────────────────────

    fn unshield_prepare(
        &mut self,
        caller: AccountId,
        nullifier: Nullifier,
        amount: u64,
        recipient: AccountId,
        now: i64,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_VAULT_PREPARE)?;
        let operation_id = self.vault.prepare(
            caller,
            OperationParams::Unshield {
                nullifier,
                amount,
                recipient,
            },
            now,
        )?;
        Ok(Receipt::UnshieldPrepared { operation_id })
    }

    fn unshield_verify(
        &mut self,
        caller: AccountId,
        operation_id: OperationId,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(self.config.per_item_cost)?;
        let attested = {
            let entry = self.expect_entry(&caller, &operation_id, OperationKind::Unshield)?;
            if entry.phase != Phase::DataStaged {
                return Err(PoolError::InvalidPhase {
                    operation: operation_id,
                    expected: Phase::DataStaged,
                    actual: entry.phase,
                });
            }
            let (nullifier, amount, recipient) = match entry.params {
                OperationParams::Unshield {
                    nullifier,
                    amount,
                    recipient,
                } => (nullifier, amount, recipient),
                _ => return Err(PoolError::NotFound(operation_id)),
            };
            let staged = staged_payload(entry)?;
            let parsed = UnshieldInputs::parse(&staged.public_inputs)?;
            if parsed.nullifier != nullifier
                || parsed.amount != amount
                || parsed.recipient != recipient
            {
                return Err(PoolError::ProofRejected {
                    reason: "staged public inputs do not match the prepared unshield".into(),
                });
            }
            self.check_payload(OperationKind::Unshield, staged)?
        };

        self.vault.advance(&caller, &operation_id, Phase::Verified)?;
        self.vault.entry_mut(&caller, &operation_id)?.attested = attested;
        Ok(Receipt::UnshieldVerified {
            operation_id,
            attested,
        })
    }

    fn unshield_apply(
        &mut self,
        caller: AccountId,
        operation_id: OperationId,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_STATE_APPLY)?;
        let (nullifier, amount) = {
            let entry = self.expect_entry(&caller, &operation_id, OperationKind::Unshield)?;
            if entry.phase != Phase::Verified {
                return Err(PoolError::InvalidPhase {
                    operation: operation_id,
                    expected: Phase::Verified,
                    actual: entry.phase,
                });
            }
            match entry.params {
                OperationParams::Unshield {
                    nullifier, amount, ..
                } => (nullifier, amount),
                _ => return Err(PoolError::NotFound(operation_id)),
            }
        };

        // Validate both mutations before applying either: the spend must
        // be all-or-nothing.
        if self.ledger.is_spent(&self.addresses.nullifier_set, &nullifier) {
            return Err(PoolError::NullifierAlreadyUsed(nullifier));
        }
        let balance = self.ledger.note_ledger(&self.addresses.note_ledger).total_shielded;
        if balance < amount {
            return Err(PoolError::InsufficientPoolBalance {
                balance,
                requested: amount,
            });
        }
        self.ledger
            .insert_nullifier(&self.addresses.nullifier_set, nullifier)?;
        self.ledger.debit_notes(&self.addresses.note_ledger, amount)?;
        self.vault.advance(&caller, &operation_id, Phase::Updated)?;
        tracing::debug!("unshield {operation_id} applied, nullifier {nullifier} spent");
        Ok(Receipt::UnshieldApplied {
            operation_id,
            nullifier,
        })
    }

    fn unshield_complete(
        &mut self,
        caller: AccountId,
        operation_id: OperationId,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_FINALIZE)?;
        let (recipient, amount) = {
            let entry = self.expect_entry(&caller, &operation_id, OperationKind::Unshield)?;
            if entry.phase != Phase::Updated {
                return Err(PoolError::InvalidPhase {
                    operation: operation_id,
                    expected: Phase::Updated,
                    actual: entry.phase,
                });
            }
            match entry.params {
                OperationParams::Unshield {
                    amount, recipient, ..
                } => (recipient, amount),
                _ => return Err(PoolError::NotFound(operation_id)),
            }
        };
        self.vault.advance(&caller, &operation_id, Phase::Completed)?;
        self.vault.finalize(&caller, &operation_id);
        tracing::info!("unshield completed: pay {amount} units to {recipient}");
        Ok(Receipt::UnshieldCompleted {
            operation_id,
            recipient,
            amount,
        })
    }

    // ───────────────────────── transfers ─────────────────────────

    fn transfer(
        &mut self,
        _caller: AccountId,
        data: &[u8],
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(self.config.per_item_cost)?;
        let data = OperationData::decode(data)?;
        let inputs = TransferInputs::parse(&data.public_inputs)?;
        let attested = self.check_payload(OperationKind::Transfer, &data)?;

        if self
            .ledger
            .is_spent(&self.addresses.nullifier_set, &inputs.nullifier)
        {
            return Err(PoolError::NullifierAlreadyUsed(inputs.nullifier));
        }
        self.ledger
            .insert_nullifier(&self.addresses.nullifier_set, inputs.nullifier)?;
        self.append_transfer_outputs(&inputs);
        tracing::debug!("transfer applied, nullifier {} spent", inputs.nullifier);
        Ok(Receipt::Transferred {
            nullifier: inputs.nullifier,
            commitments: [inputs.commitment_out_a, inputs.commitment_out_b],
            attested,
            allowance_remaining: None,
        })
    }

    fn transfer_from(
        &mut self,
        caller: AccountId,
        owner: AccountId,
        amount: u64,
        data: &[u8],
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(self.config.per_item_cost)?;
        let data = OperationData::decode(data)?;
        let inputs = TransferInputs::parse_with_amount(&data.public_inputs)?;
        let disclosed = inputs.disclosed_amount.unwrap_or_default();
        if disclosed != amount {
            return Err(PoolError::AmountMismatch {
                instruction: amount,
                disclosed,
            });
        }
        let attested = self.check_payload(OperationKind::TransferFrom, &data)?;

        let allowance_addr =
            allowance_address(&self.addresses.pool_state, &owner, &caller).address;
        let remaining = self.ledger.allowance(&allowance_addr);
        if remaining < amount {
            return Err(PoolError::InsufficientAllowance {
                remaining,
                requested: amount,
            });
        }
        if self
            .ledger
            .is_spent(&self.addresses.nullifier_set, &inputs.nullifier)
        {
            return Err(PoolError::NullifierAlreadyUsed(inputs.nullifier));
        }

        self.ledger
            .insert_nullifier(&self.addresses.nullifier_set, inputs.nullifier)?;
        self.append_transfer_outputs(&inputs);
        let remaining = self.ledger.debit_allowance(&allowance_addr, amount)?;
        tracing::debug!(
            "transfer_from applied: {amount} units of {owner}'s allowance spent by {caller}"
        );
        Ok(Receipt::Transferred {
            nullifier: inputs.nullifier,
            commitments: [inputs.commitment_out_a, inputs.commitment_out_b],
            attested,
            allowance_remaining: Some(remaining),
        })
    }

    fn approve(
        &mut self,
        caller: AccountId,
        spender: AccountId,
        amount: u64,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_APPROVE)?;
        let addr = allowance_address(&self.addresses.pool_state, &caller, &spender).address;
        self.ledger.set_allowance(addr, amount);
        tracing::debug!("{caller} approved {spender} for {amount} units");
        Ok(Receipt::Approved {
            owner: caller,
            spender,
            amount,
        })
    }

    // ───────────────────────── batches ─────────────────────────

    fn batch_transfer(
        &mut self,
        _caller: AccountId,
        raw_items: &[Vec<u8>],
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_BATCH_OVERHEAD)?;
        let items = batch::decode_items(raw_items, false)?;
        self.admit_batch(&items, meter)?;

        let nullifiers: Vec<Nullifier> = items.iter().map(BatchItem::nullifier).collect();
        self.ledger
            .insert_nullifiers(&self.addresses.nullifier_set, &nullifiers)?;
        for item in &items {
            self.append_transfer_outputs(&item.inputs);
        }
        tracing::info!("applied batch of {} transfers", items.len());
        Ok(Receipt::BatchApplied {
            count: items.len(),
            nullifiers,
            allowance_remaining: None,
        })
    }

    fn batch_transfer_from(
        &mut self,
        caller: AccountId,
        owner: AccountId,
        raw_items: &[Vec<u8>],
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_BATCH_OVERHEAD)?;
        let items = batch::decode_items(raw_items, true)?;
        self.admit_batch(&items, meter)?;

        let total = batch::disclosed_total(&items)?;
        let allowance_addr =
            allowance_address(&self.addresses.pool_state, &owner, &caller).address;
        let remaining = self.ledger.allowance(&allowance_addr);
        if remaining < total {
            return Err(PoolError::InsufficientAllowance {
                remaining,
                requested: total,
            });
        }

        let nullifiers: Vec<Nullifier> = items.iter().map(BatchItem::nullifier).collect();
        self.ledger
            .insert_nullifiers(&self.addresses.nullifier_set, &nullifiers)?;
        for item in &items {
            self.append_transfer_outputs(&item.inputs);
        }
        let remaining = self.ledger.debit_allowance(&allowance_addr, total)?;
        tracing::info!(
            "applied batch of {} transfers from {owner}'s allowance ({total} units)",
            items.len()
        );
        Ok(Receipt::BatchApplied {
            count: items.len(),
            nullifiers,
            allowance_remaining: Some(remaining),
        })
    }

    /// Size/duplicate/replay admission plus per-item verification. Runs
    /// entirely before any mutation.
    fn admit_batch(&self, items: &[BatchItem], meter: &mut CallMeter) -> Result<()> {
        let max = self.config.effective_max_batch_size();
        batch::validate_batch(items, max, &self.ledger, &self.addresses.nullifier_set)?;
        meter.charge(items.len() as u64 * self.config.per_item_cost)?;
        let kind = if items
            .first()
            .map(|i| i.inputs.disclosed_amount.is_some())
            .unwrap_or(false)
        {
            OperationKind::TransferFrom
        } else {
            OperationKind::Transfer
        };
        for item in items {
            self.check_payload(kind, &item.data)?;
        }
        Ok(())
    }

    fn append_transfer_outputs(&mut self, inputs: &TransferInputs) {
        self.ledger
            .append_commitment(&self.addresses.commitment_tree, inputs.commitment_out_a);
        self.ledger
            .append_commitment(&self.addresses.commitment_tree, inputs.commitment_out_b);
    }

    // ───────────────────────── verifying keys ─────────────────────────

    fn register_verifying_key(
        &mut self,
        circuit: OperationKind,
        version: u32,
        key: Vec<u8>,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_REGISTRY_WRITE)?;
        let tag = circuit.circuit_tag();
        let addr = verifying_key_address(&tag, version).address;
        self.ledger.register_verifying_key(
            addr,
            VerifyingKeyRecord {
                circuit_tag: tag,
                version,
                key,
                revoked: false,
            },
        )?;
        tracing::info!("registered verifying key for {circuit} v{version}");
        Ok(Receipt::VerifyingKeyRegistered { circuit, version })
    }

    fn revoke_verifying_key(
        &mut self,
        circuit: OperationKind,
        version: u32,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_REGISTRY_WRITE)?;
        let addr = verifying_key_address(&circuit.circuit_tag(), version).address;
        if !self.ledger.revoke_verifying_key(&addr) {
            return Err(PoolError::UnknownVerifyingKey {
                circuit: circuit.to_string(),
                version,
            });
        }
        tracing::warn!("revoked verifying key for {circuit} v{version}");
        Ok(Receipt::VerifyingKeyRevoked { circuit, version })
    }

    // ───────────────────────── shared checks ─────────────────────────

    fn expect_entry(
        &self,
        user: &AccountId,
        operation_id: &OperationId,
        kind: OperationKind,
    ) -> Result<&VaultEntry> {
        let entry = self
            .vault
            .get(user, operation_id)
            .ok_or(PoolError::NotFound(*operation_id))?;
        // Ids are kind-tagged, so a kind mismatch means the caller is
        // driving the wrong operation.
        if entry.kind != kind {
            return Err(PoolError::NotFound(*operation_id));
        }
        Ok(entry)
    }

    fn stage_payload(
        &mut self,
        caller: AccountId,
        operation_id: OperationId,
        bytes: &[u8],
        kind: OperationKind,
        meter: &mut CallMeter,
    ) -> Result<Receipt> {
        meter.charge(COST_STAGE_DATA)?;
        let data = OperationData::decode(bytes)?;
        self.expect_entry(&caller, &operation_id, kind)?;
        let has_attestation = data.attestation.is_some();
        self.vault.stage_data(&caller, &operation_id, data)?;
        Ok(Receipt::DataStaged {
            operation_id,
            has_attestation,
        })
    }

    /// Accept or reject a staged payload. Returns whether acceptance came
    /// from a bound attestation (`true`) or the independent verifier
    /// (`false`).
    fn check_payload(&self, kind: OperationKind, data: &OperationData) -> Result<bool> {
        let record = self.active_verifying_key(kind)?;
        match &data.attestation {
            Some(attestation) => {
                // Recompute the binding digests; the attestation's own
                // claims are never taken at face value.
                if attestation.proof_hash != data.proof.digest()
                    || attestation.public_inputs_hash != data.public_inputs.digest()
                    || attestation.verifying_key_hash != digest32(&record.key)
                {
                    return Err(PoolError::ProofRejected {
                        reason: "attestation does not bind this proof and verifying key".into(),
                    });
                }
                if !attestation.is_valid {
                    return Err(PoolError::ProofRejected {
                        reason: "verifier returned a definitive invalid verdict".into(),
                    });
                }
                Ok(true)
            }
            None => match &self.verifier {
                Some(verifier) => {
                    if verifier.verify(&data.proof, &data.public_inputs, &record.key) {
                        Ok(false)
                    } else {
                        Err(PoolError::ProofRejected {
                            reason: "independent verification failed".into(),
                        })
                    }
                }
                None => Err(PoolError::ProofRejected {
                    reason: "payload carries no attestation and no independent verifier is configured"
                        .into(),
                }),
            },
        }
    }

    fn active_verifying_key(&self, kind: OperationKind) -> Result<VerifyingKeyRecord> {
        let addr = verifying_key_address(&kind.circuit_tag(), self.config.vk_version).address;
        let record =
            self.ledger
                .verifying_key(&addr)
                .ok_or_else(|| PoolError::UnknownVerifyingKey {
                    circuit: kind.to_string(),
                    version: self.config.vk_version,
                })?;
        if record.revoked {
            return Err(PoolError::VerifyingKeyRevoked {
                circuit: kind.to_string(),
                version: record.version,
            });
        }
        Ok(record)
    }
}

fn staged_payload(entry: &VaultEntry) -> Result<&OperationData> {
    entry.staged.as_ref().ok_or(PoolError::InvalidPhase {
        operation: entry.operation_id,
        expected: Phase::DataStaged,
        actual: entry.phase,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
