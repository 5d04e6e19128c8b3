//! Approximate tag-set sampling through a direct-mapped cache of unrolled lists.
//!
//! An unrolled list replicates each related tag proportionally to its
//! probability mass, so a candidate is one uniform index into a `Vec`.
//! For related tag `i` with cumulative probability `p_i` (and `p_{-1} = 0`)
//! the list holds
//!
//! ```text
//! floor((p_i - p_{i-1}) * expansion_factor) + 1
//! ```
//!
//! copies. The `+1` keeps zero-width tags reachable, which biases small
//! gaps upwards: the cached distribution is an approximation.
//!
//! Slots are selected by `tag % capacity` and hold one tag each. A miss
//! overwrites the slot (no LRU, no associativity).
//!
//! The cache is mutated on reads and is not `Sync`-shareable by design of
//! the API (`&mut self`): give each worker its own [`UnrolledCache`] over
//! the same `Arc<CorrelationModel>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, trace};

use crate::config::SamplerConfig;
use crate::error::SamplingError;
use crate::model::{Correlation, CorrelationModel, TagId};

/// Compute the unrolled list for one correlation row into `out`.
///
/// `out` is cleared first.
pub fn unroll_into(correlations: &[Correlation], expansion_factor: usize, out: &mut Vec<TagId>) {
    out.clear();
    let mut previous = 0.0_f64;
    for c in correlations {
        let copies = ((c.cumulative - previous) * expansion_factor as f64).floor() as usize + 1;
        out.extend(std::iter::repeat(c.related).take(copies));
        previous = c.cumulative;
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    resident: Option<TagId>,
    unrolled: Vec<TagId>,
}

/// Hit / miss / fill counters.
///
/// `fills` and `evictions` count every slot rebuild, whether it came from a
/// miss, [`UnrolledCache::warm`] or a direct [`UnrolledCache::fill`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Slot rebuilds.
    pub fills: u64,
    /// Fills that replaced another resident tag.
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Direct-mapped cache of unrolled lists plus the cached set sampler.
#[derive(Debug, Clone)]
pub struct UnrolledCache {
    model: Arc<CorrelationModel>,
    slots: Vec<Slot>,
    expansion_factor: usize,
    max_draws: usize,
    stats: CacheStats,
}

impl UnrolledCache {
    /// Create a cold cache over `model`.
    ///
    /// Slots are allocated up front; their lists grow on first fill.
    pub fn new(model: Arc<CorrelationModel>, config: &SamplerConfig) -> Result<Self, SamplingError> {
        config.validate()?;
        if model.is_empty() {
            return Err(SamplingError::EmptyModel);
        }
        info!(
            capacity = config.cache_capacity,
            expansion_factor = config.expansion_factor,
            "built unrolled cache"
        );
        Ok(Self {
            model,
            slots: vec![Slot::default(); config.cache_capacity],
            expansion_factor: config.expansion_factor,
            max_draws: config.max_draws,
            stats: CacheStats::default(),
        })
    }

    /// Cold cache with the same shape over the same model.
    pub fn fork(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            slots: vec![Slot::default(); self.slots.len()],
            expansion_factor: self.expansion_factor,
            max_draws: self.max_draws,
            stats: CacheStats::default(),
        }
    }

    pub fn model(&self) -> &Arc<CorrelationModel> {
        &self.model
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn expansion_factor(&self) -> usize {
        self.expansion_factor
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[inline]
    fn slot_index(&self, tag: TagId) -> usize {
        tag as usize % self.slots.len()
    }

    /// Tag currently resident in the slot `tag` maps to.
    pub fn resident(&self, tag: TagId) -> Option<TagId> {
        self.slots[self.slot_index(tag)].resident
    }

    /// Unrolled list for `tag` if it is resident.
    pub fn cached(&self, tag: TagId) -> Option<&[TagId]> {
        let slot = &self.slots[self.slot_index(tag)];
        (slot.resident == Some(tag)).then_some(slot.unrolled.as_slice())
    }

    /// Rebuild the slot for `tag` unconditionally and return its list.
    ///
    /// Overwrites whichever tag was resident. An unknown tag yields an
    /// empty list.
    pub fn fill(&mut self, tag: TagId) -> &[TagId] {
        let idx = self.slot_index(tag);
        let slot = &mut self.slots[idx];
        self.stats.fills += 1;
        if slot.resident.is_some_and(|r| r != tag) {
            self.stats.evictions += 1;
        }
        unroll_into(self.model.correlations(tag), self.expansion_factor, &mut slot.unrolled);
        slot.resident = Some(tag);
        trace!(tag, slot = idx, len = slot.unrolled.len(), "filled cache slot");
        &slot.unrolled
    }

    /// Fill every known tag in ascending order.
    ///
    /// Colliding tags overwrite each other, so the highest id per slot stays
    /// resident. Does not count as hits or misses.
    pub fn warm(&mut self) {
        let model = Arc::clone(&self.model);
        for &tag in model.known_categories() {
            self.fill(tag);
        }
        let resident = self.slots.iter().filter(|s| s.resident.is_some()).count();
        debug!(resident, capacity = self.slots.len(), "warmed unrolled cache");
    }

    /// Drop every resident list and reset the counters.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.resident = None;
            slot.unrolled = Vec::new();
        }
        self.stats = CacheStats::default();
    }

    /// Resident list for `tag`, filling on a miss.
    fn lookup(&mut self, tag: TagId) -> &[TagId] {
        let idx = self.slot_index(tag);
        if self.slots[idx].resident == Some(tag) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            self.fill(tag);
        }
        &self.slots[idx].unrolled
    }

    /// Draw a set of `target` distinct tags containing `start` from the
    /// unrolled (approximate) distribution.
    ///
    /// An unknown `start` draws each candidate from a uniformly random known
    /// tag picked with `category_rng`; `draw_rng` picks the index into the
    /// unrolled list.
    pub fn draw_set<C, D>(
        &mut self,
        category_rng: &mut C,
        draw_rng: &mut D,
        start: TagId,
        target: usize,
    ) -> Result<BTreeSet<TagId>, SamplingError>
    where
        C: Rng + ?Sized,
        D: Rng + ?Sized,
    {
        if target == 0 {
            return Err(SamplingError::ZeroTarget);
        }

        let mut tags = BTreeSet::new();
        tags.insert(start);
        let mut draws = 0usize;

        while tags.len() < target {
            if draws == self.max_draws {
                debug!(start, target, reached = tags.len(), draws, "draw budget exhausted");
                return Err(SamplingError::TargetUnreachable {
                    target,
                    reached: tags.len(),
                    draws,
                });
            }

            let working = self.model.resolve_known(start, category_rng);
            let unrolled = self.lookup(working);
            let pick = unrolled[draw_rng.random_range(0..unrolled.len())];
            tags.insert(pick);
            draws += 1;
        }

        Ok(tags)
    }
}
