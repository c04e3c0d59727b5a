//! The typed instruction surface of the pool.
//!
//! Callers drive every state change through exactly one of these variants;
//! each carries only the fields its step needs, so a malformed call fails
//! at decode time instead of deep inside a handler. Phased operations
//! (shield, unshield) appear as one variant per step.

use veilpool_common::{AccountId, Commitment, Nullifier, OperationId, OperationKind};

/// One call into the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Record a pending deposit of `amount` against `commitment`.
    ShieldPrepare { amount: u64, commitment: Commitment },
    /// Stage an attested proof payload for a pending shield.
    ShieldStageData {
        operation_id: OperationId,
        data: Vec<u8>,
    },
    /// Insert the commitment and credit the pool.
    ShieldComplete { operation_id: OperationId },

    /// Record a pending withdrawal of `amount` to `recipient`, consuming
    /// the note behind `nullifier`.
    UnshieldPrepare {
        nullifier: Nullifier,
        amount: u64,
        recipient: AccountId,
    },
    /// Stage the proof payload for a pending unshield.
    UnshieldStageData {
        operation_id: OperationId,
        data: Vec<u8>,
    },
    /// Check the staged payload against its attestation (or the
    /// independent verifier) and mark the operation verified.
    UnshieldVerify { operation_id: OperationId },
    /// Apply the spend: insert the nullifier, debit the note ledger.
    UnshieldApply { operation_id: OperationId },
    /// Record the payout and drop the vault entry.
    UnshieldComplete { operation_id: OperationId },

    /// Single-call in-pool transfer.
    Transfer { data: Vec<u8> },
    /// Single-call transfer spending `owner`'s allowance to the caller.
    TransferFrom {
        owner: AccountId,
        amount: u64,
        data: Vec<u8>,
    },
    /// Set (overwrite) the caller's allowance for `spender`.
    Approve { spender: AccountId, amount: u64 },

    /// Apply several transfers atomically.
    BatchTransfer { items: Vec<Vec<u8>> },
    /// Apply several allowance-funded transfers atomically.
    BatchTransferFrom {
        owner: AccountId,
        items: Vec<Vec<u8>>,
    },

    /// Register the verifying key for `(circuit, version)`. Write-once.
    RegisterVerifyingKey {
        circuit: OperationKind,
        version: u32,
        key: Vec<u8>,
    },
    /// Revoke a previously registered verifying key.
    RevokeVerifyingKey { circuit: OperationKind, version: u32 },
}

impl Instruction {
    /// Stable label for logging and usage reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::ShieldPrepare { .. } => "shield_prepare",
            Instruction::ShieldStageData { .. } => "shield_stage_data",
            Instruction::ShieldComplete { .. } => "shield_complete",
            Instruction::UnshieldPrepare { .. } => "unshield_prepare",
            Instruction::UnshieldStageData { .. } => "unshield_stage_data",
            Instruction::UnshieldVerify { .. } => "unshield_verify",
            Instruction::UnshieldApply { .. } => "unshield_apply",
            Instruction::UnshieldComplete { .. } => "unshield_complete",
            Instruction::Transfer { .. } => "transfer",
            Instruction::TransferFrom { .. } => "transfer_from",
            Instruction::Approve { .. } => "approve",
            Instruction::BatchTransfer { .. } => "batch_transfer",
            Instruction::BatchTransferFrom { .. } => "batch_transfer_from",
            Instruction::RegisterVerifyingKey { .. } => "register_verifying_key",
            Instruction::RevokeVerifyingKey { .. } => "revoke_verifying_key",
        }
    }
}

/// What an executed instruction did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    ShieldPrepared {
        operation_id: OperationId,
    },
    /// Shared by shield and unshield staging steps.
    DataStaged {
        operation_id: OperationId,
        has_attestation: bool,
    },
    ShieldCompleted {
        operation_id: OperationId,
        commitment: Commitment,
        leaf_index: u64,
    },
    UnshieldPrepared {
        operation_id: OperationId,
    },
    UnshieldVerified {
        operation_id: OperationId,
        attested: bool,
    },
    UnshieldApplied {
        operation_id: OperationId,
        nullifier: Nullifier,
    },
    /// The payout itself is the runtime's job; this receipt is its order.
    UnshieldCompleted {
        operation_id: OperationId,
        recipient: AccountId,
        amount: u64,
    },
    Transferred {
        nullifier: Nullifier,
        commitments: [Commitment; 2],
        attested: bool,
        /// Remaining allowance after a transfer-from; `None` for plain
        /// transfers.
        allowance_remaining: Option<u64>,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        amount: u64,
    },
    BatchApplied {
        count: usize,
        nullifiers: Vec<Nullifier>,
        /// Remaining allowance after a batch transfer-from.
        allowance_remaining: Option<u64>,
    },
    VerifyingKeyRegistered {
        circuit: OperationKind,
        version: u32,
    },
    VerifyingKeyRevoked {
        circuit: OperationKind,
        version: u32,
    },
}
