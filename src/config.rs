//! Sampler configuration.
//!
//! The cache knobs trade memory for accuracy:
//! - `cache_capacity` is the number of direct-mapped slots. Two categories
//!   whose ids collide modulo the capacity evict each other on every switch.
//! - `expansion_factor` is the replication granularity of an unrolled list.
//!   A slot for a category with `n` related tags holds between `n` and
//!   `expansion_factor + n` ids; the per-tag rounding error is at most
//!   `1 / expansion_factor` of probability mass (plus the `+1` floor).
//!
//! Worst-case cache memory is roughly `cache_capacity * expansion_factor`
//! tag ids.

use serde::Deserialize;

use crate::error::ConfigError;

/// Default number of direct-mapped cache slots.
pub const DEFAULT_CACHE_CAPACITY: usize = 20_000;
/// Default replication granularity for unrolled lists.
pub const DEFAULT_EXPANSION_FACTOR: usize = 10_000;
/// Default draw budget for one set query.
pub const DEFAULT_MAX_DRAWS: usize = 100_000;
/// Default raw-index redraw budget for the exact sampler.
pub const DEFAULT_MAX_REDRAWS: usize = 1_024;

/// Configuration shared by the exact sampler and the unrolled cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub cache_capacity: usize,
    pub expansion_factor: usize,
    /// Upper bound on candidate draws per set query.
    pub max_draws: usize,
    /// Upper bound on raw-index redraws when resolving a working category.
    pub max_redraws: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            expansion_factor: DEFAULT_EXPANSION_FACTOR,
            max_draws: DEFAULT_MAX_DRAWS,
            max_redraws: DEFAULT_MAX_REDRAWS,
        }
    }
}

impl SamplerConfig {
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_expansion_factor(mut self, expansion_factor: usize) -> Self {
        self.expansion_factor = expansion_factor;
        self
    }

    pub fn with_max_draws(mut self, max_draws: usize) -> Self {
        self.max_draws = max_draws;
        self
    }

    pub fn with_max_redraws(mut self, max_redraws: usize) -> Self {
        self.max_redraws = max_redraws;
        self
    }

    /// Check that every knob is usable.
    ///
    /// `max_redraws` may be zero: the exact sampler then goes straight to
    /// the known-category fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "cache_capacity",
            });
        }
        if self.expansion_factor == 0 {
            return Err(ConfigError::Zero {
                field: "expansion_factor",
            });
        }
        if self.max_draws == 0 {
            return Err(ConfigError::Zero { field: "max_draws" });
        }
        Ok(())
    }
}
