//! Pool configuration.

use serde::{Deserialize, Serialize};

use crate::budget::{
    choose_max_batch_size, COMPUTE_CEILING, DEFAULT_PER_ITEM_COST, DEFAULT_SAFETY_MARGIN_BPS,
    MAX_BATCH_SIZE,
};

/// Default lifetime of a non-finalized vault entry, in seconds.
pub const DEFAULT_VAULT_TTL_SECS: i64 = 86_400;

/// Static configuration of one pool instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Seed the pool's singleton state addresses are derived from.
    pub pool_seed: [u8; 32],
    /// Hard cap on batch length from payload layout alone.
    pub max_batch_size: usize,
    /// Per-call compute allotment.
    pub compute_ceiling: u64,
    /// Measured all-in cost of one batch item.
    pub per_item_cost: u64,
    /// Head-room kept when sizing batches against the ceiling, in basis
    /// points.
    pub safety_margin_bps: u32,
    /// Lifetime of a non-finalized vault entry before it may be swept.
    pub vault_ttl_secs: i64,
    /// Active verifying-key version for every circuit of this pool.
    pub vk_version: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_seed: [0u8; 32],
            max_batch_size: MAX_BATCH_SIZE,
            compute_ceiling: COMPUTE_CEILING,
            per_item_cost: DEFAULT_PER_ITEM_COST,
            safety_margin_bps: DEFAULT_SAFETY_MARGIN_BPS,
            vault_ttl_secs: DEFAULT_VAULT_TTL_SECS,
            vk_version: 1,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// The batch maximum actually enforced: the smaller of the layout cap
    /// and what the compute ceiling affords at the measured per-item cost.
    pub fn effective_max_batch_size(&self) -> usize {
        let by_budget = choose_max_batch_size(
            self.per_item_cost,
            self.compute_ceiling,
            self.safety_margin_bps,
        );
        self.max_batch_size.min(by_budget)
    }
}

/// Builder for [`PoolConfig`].
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn pool_seed(mut self, seed: [u8; 32]) -> Self {
        self.config.pool_seed = seed;
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.config.max_batch_size = max;
        self
    }

    pub fn compute_ceiling(mut self, ceiling: u64) -> Self {
        self.config.compute_ceiling = ceiling;
        self
    }

    pub fn per_item_cost(mut self, cost: u64) -> Self {
        self.config.per_item_cost = cost;
        self
    }

    pub fn safety_margin_bps(mut self, bps: u32) -> Self {
        self.config.safety_margin_bps = bps;
        self
    }

    pub fn vault_ttl_secs(mut self, secs: i64) -> Self {
        self.config.vault_ttl_secs = secs;
        self
    }

    pub fn vk_version(mut self, version: u32) -> Self {
        self.config.vk_version = version;
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
