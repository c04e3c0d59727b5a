//! Batch admission checks.
//!
//! A batch is checked in full before any item touches state: size bounds
//! first, then intra-batch nullifier duplicates, then replays against the
//! persisted spent set. Only a batch that clears every check is applied,
//! and application itself goes through the ledger's atomic bulk insert,
//! so a rejected batch leaves the spent set exactly as it was.

use std::collections::HashSet;

use veilpool_common::{Nullifier, OperationData, StateAddress, TransferInputs};

use crate::error::{PoolError, Result};
use crate::ledger::Ledger;

/// A decoded batch item: the staged payload plus its parsed transfer
/// layout.
#[derive(Clone, Debug)]
pub struct BatchItem {
    pub data: OperationData,
    pub inputs: TransferInputs,
}

impl BatchItem {
    pub fn nullifier(&self) -> Nullifier {
        self.inputs.nullifier
    }
}

/// Decode and parse every raw item. `with_amount` selects the five-word
/// transfer-from layout. Structural failures abort the whole batch before
/// any other check runs.
pub fn decode_items(raw: &[Vec<u8>], with_amount: bool) -> Result<Vec<BatchItem>> {
    raw.iter()
        .map(|bytes| {
            let data = OperationData::decode(bytes)?;
            let inputs = if with_amount {
                TransferInputs::parse_with_amount(&data.public_inputs)?
            } else {
                TransferInputs::parse(&data.public_inputs)?
            };
            Ok(BatchItem { data, inputs })
        })
        .collect()
}

/// Admission checks for a decoded batch, in order: emptiness, size,
/// intra-batch duplicates, persisted replays.
pub fn validate_batch<L: Ledger>(
    items: &[BatchItem],
    max_items: usize,
    ledger: &L,
    nullifier_set: &StateAddress,
) -> Result<()> {
    if items.is_empty() {
        return Err(PoolError::EmptyBatch);
    }
    if items.len() > max_items {
        return Err(PoolError::BatchTooLarge {
            len: items.len(),
            max: max_items,
        });
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        let nullifier = item.nullifier();
        if !seen.insert(nullifier) {
            return Err(PoolError::DuplicateNullifier(nullifier));
        }
    }
    for item in items {
        let nullifier = item.nullifier();
        if ledger.is_spent(nullifier_set, &nullifier) {
            return Err(PoolError::NullifierAlreadyUsed(nullifier));
        }
    }
    Ok(())
}

/// Sum of the disclosed amounts of a transfer-from batch.
pub fn disclosed_total(items: &[BatchItem]) -> Result<u64> {
    let mut total: u64 = 0;
    for item in items {
        let amount = item.inputs.disclosed_amount.unwrap_or(0);
        total = total.checked_add(amount).ok_or(PoolError::ValueOverflow)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use veilpool_common::{Commitment, ProofBlob, PublicInputs};

    fn item(nullifier_byte: u8) -> BatchItem {
        let inputs = TransferInputs {
            merkle_root: [0u8; 32],
            nullifier: Nullifier([nullifier_byte; 32]),
            commitment_out_a: Commitment([nullifier_byte.wrapping_add(1); 32]),
            commitment_out_b: Commitment([nullifier_byte.wrapping_add(2); 32]),
            disclosed_amount: None,
        };
        BatchItem {
            data: OperationData {
                proof: ProofBlob::from_array([0u8; 256]),
                attestation: None,
                public_inputs: inputs.encode(),
            },
            inputs,
        }
    }

    fn set_addr() -> StateAddress {
        StateAddress([9u8; 32])
    }

    #[test]
    fn empty_batch_is_rejected() {
        let ledger = MemoryLedger::new();
        let err = validate_batch(&[], 3, &ledger, &set_addr()).unwrap_err();
        assert_eq!(err, PoolError::EmptyBatch);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let ledger = MemoryLedger::new();
        let items: Vec<BatchItem> = (0..4).map(item).collect();
        let err = validate_batch(&items, 3, &ledger, &set_addr()).unwrap_err();
        assert_eq!(err, PoolError::BatchTooLarge { len: 4, max: 3 });
    }

    #[test]
    fn three_distinct_items_pass() {
        let ledger = MemoryLedger::new();
        let items: Vec<BatchItem> = (0..3).map(item).collect();
        validate_batch(&items, 3, &ledger, &set_addr()).unwrap();
    }

    #[test]
    fn intra_batch_duplicate_rejects_the_whole_batch() {
        let ledger = MemoryLedger::new();
        let items = vec![item(1), item(2), item(1)];
        let err = validate_batch(&items, 3, &ledger, &set_addr()).unwrap_err();
        assert_eq!(err, PoolError::DuplicateNullifier(Nullifier([1u8; 32])));
    }

    #[test]
    fn persisted_replay_is_detected_before_application() {
        let mut ledger = MemoryLedger::new();
        ledger
            .insert_nullifier(&set_addr(), Nullifier([2u8; 32]))
            .unwrap();
        let items = vec![item(1), item(2)];
        let err = validate_batch(&items, 3, &ledger, &set_addr()).unwrap_err();
        assert_eq!(err, PoolError::NullifierAlreadyUsed(Nullifier([2u8; 32])));
    }

    #[test]
    fn decode_items_surfaces_structural_errors() {
        let good = item(1).data.encode();
        let truncated = good[..good.len() - 1].to_vec();
        let err = decode_items(&[good, truncated], false).unwrap_err();
        assert!(matches!(err, PoolError::Structural(_)));
    }

    #[test]
    fn disclosed_total_sums_amounts() {
        let mut a = item(1);
        a.inputs.disclosed_amount = Some(100);
        let mut b = item(2);
        b.inputs.disclosed_amount = Some(250);
        assert_eq!(disclosed_total(&[a, b]).unwrap(), 350);
    }
}
