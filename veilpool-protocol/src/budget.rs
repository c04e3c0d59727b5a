//! Per-call resource budgeting.
//!
//! The execution environment grants a fixed compute allotment per call;
//! exceeding it aborts the call, so batch sizing has to be decided against
//! the ceiling ahead of time rather than discovered by failing. Consumption
//! is observed through an injected [`UsageReporter`] rather than any global
//! counter, so embedders and tests can meter calls without touching shared
//! state.

use std::sync::Mutex;

use crate::error::{PoolError, Result};

/// Compute allotment per call, in runtime units.
pub const COMPUTE_CEILING: u64 = 1_400_000;

/// Theoretical batch cap from payload layout alone.
pub const MAX_BATCH_SIZE: usize = 10;

/// Measured all-in cost of one batch item (proof verification dominates).
pub const DEFAULT_PER_ITEM_COST: u64 = 420_000;

/// Default sizing head-room, in basis points.
pub const DEFAULT_SAFETY_MARGIN_BPS: u32 = 1_000;

const BPS_DENOMINATOR: u64 = 10_000;

// Step costs for the non-verify parts of an operation, mirrored from the
// reference runtime's measurements.
pub const COST_VAULT_PREPARE: u64 = 30_000;
pub const COST_STAGE_DATA: u64 = 45_000;
pub const COST_STATE_APPLY: u64 = 60_000;
pub const COST_FINALIZE: u64 = 20_000;
pub const COST_APPROVE: u64 = 15_000;
pub const COST_REGISTRY_WRITE: u64 = 25_000;
pub const COST_BATCH_OVERHEAD: u64 = 20_000;

/// Largest batch size n with `n * per_item_cost` inside the ceiling after
/// shaving `margin_bps` off it.
///
/// A zero per-item cost means sizing is not cost-bound and the theoretical
/// cap applies. A margin of 100% (or more) leaves no usable budget and
/// yields zero.
pub fn choose_max_batch_size(per_item_cost: u64, ceiling: u64, margin_bps: u32) -> usize {
    let margin = u64::from(margin_bps).min(BPS_DENOMINATOR);
    let usable = (u128::from(ceiling) * u128::from(BPS_DENOMINATOR - margin))
        / u128::from(BPS_DENOMINATOR);
    if per_item_cost == 0 {
        return MAX_BATCH_SIZE;
    }
    usize::try_from(usable / u128::from(per_item_cost)).unwrap_or(usize::MAX)
}

/// Accumulates the units charged during one call and fails the call when
/// the ceiling is crossed.
#[derive(Debug)]
pub struct CallMeter {
    ceiling: u64,
    used: u64,
}

impl CallMeter {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling, used: 0 }
    }

    pub fn charge(&mut self, units: u64) -> Result<()> {
        self.used = self.used.saturating_add(units);
        if self.used > self.ceiling {
            return Err(PoolError::BudgetExceeded {
                used: self.used,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.used)
    }
}

/// Observation seam for per-call resource consumption.
///
/// Injected at engine construction; the engine reports the label of every
/// executed instruction with the units it consumed, successful or not.
pub trait UsageReporter {
    fn record(&self, label: &str, units: u64);
}

/// Discards every report. The default for embedders that do their own
/// accounting downstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl UsageReporter for NullReporter {
    fn record(&self, _label: &str, _units: u64) {}
}

/// Keeps every report in memory. Used by tests and benchmarks to assert on
/// consumption without global counters.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<(String, u64)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, u64)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.entries().iter().map(|(_, units)| units).sum()
    }
}

impl UsageReporter for RecordingReporter {
    fn record(&self, label: &str, units: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((label.to_owned(), units));
        }
    }
}

impl<R: UsageReporter> UsageReporter for &R {
    fn record(&self, label: &str, units: u64) {
        (*self).record(label, units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_cap_is_three_under_default_costs() {
        let n = choose_max_batch_size(
            DEFAULT_PER_ITEM_COST,
            COMPUTE_CEILING,
            DEFAULT_SAFETY_MARGIN_BPS,
        );
        assert_eq!(n, 3);
    }

    #[test]
    fn zero_cost_falls_back_to_theoretical_cap() {
        assert_eq!(choose_max_batch_size(0, COMPUTE_CEILING, 0), MAX_BATCH_SIZE);
    }

    #[test]
    fn full_margin_leaves_no_room() {
        assert_eq!(choose_max_batch_size(1, COMPUTE_CEILING, 10_000), 0);
        // Margins above 100% clamp rather than underflow.
        assert_eq!(choose_max_batch_size(1, COMPUTE_CEILING, 60_000), 0);
    }

    #[test]
    fn meter_trips_exactly_at_the_ceiling() {
        let mut meter = CallMeter::new(100);
        meter.charge(60).unwrap();
        meter.charge(40).unwrap();
        assert_eq!(meter.remaining(), 0);
        let err = meter.charge(1).unwrap_err();
        assert_eq!(
            err,
            PoolError::BudgetExceeded {
                used: 101,
                ceiling: 100
            }
        );
    }

    #[test]
    fn recording_reporter_accumulates() {
        let reporter = RecordingReporter::new();
        reporter.record("transfer", 480_000);
        reporter.record("approve", 15_000);
        assert_eq!(reporter.total(), 495_000);
        assert_eq!(reporter.entries()[0].0, "transfer");
    }
}
