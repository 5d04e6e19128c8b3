//! Exact weighted tag-set sampling.
//!
//! Each candidate is drawn by binary search over the working tag's
//! cumulative-probability sequence: draw `r ~ Uniform[0, 1)` and take the
//! first related tag whose cumulative value exceeds `r`. This is exact with
//! respect to the loaded distribution and costs O(log n) per draw.
//!
//! Working-tag resolution: the start tag is used while it has correlations.
//! Otherwise a raw index in `[0, categories)` is drawn and used as a tag id
//! until it names a known tag. Raw indices only hit when tag ids are dense
//! from zero, so after `max_redraws` misses a uniformly random known tag is
//! used instead.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, trace};

use crate::config::SamplerConfig;
use crate::error::SamplingError;
use crate::model::{Correlation, CorrelationModel, TagId};

/// Pick the related tag selected by `r` from a cumulative sequence.
///
/// Returns the first entry whose cumulative probability is strictly greater
/// than `r`. If `r` is at or above the last cumulative value (a row whose
/// mass sums below 1), the last entry is returned.
///
/// # Panics
///
/// Panics if `correlations` is empty.
pub fn weighted_pick(correlations: &[Correlation], r: f64) -> TagId {
    assert!(
        !correlations.is_empty(),
        "weighted_pick: correlations must be non-empty"
    );
    let idx = correlations.partition_point(|c| c.cumulative <= r);
    correlations[idx.min(correlations.len() - 1)].related
}

/// Binary-search sampler over a shared [`CorrelationModel`].
///
/// Holds no mutable state; one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct ExactSampler {
    model: Arc<CorrelationModel>,
    max_draws: usize,
    max_redraws: usize,
}

impl ExactSampler {
    /// Create a sampler over `model`.
    ///
    /// Fails on an invalid config or an empty model.
    pub fn new(model: Arc<CorrelationModel>, config: &SamplerConfig) -> Result<Self, SamplingError> {
        config.validate()?;
        if model.is_empty() {
            return Err(SamplingError::EmptyModel);
        }
        Ok(Self {
            model,
            max_draws: config.max_draws,
            max_redraws: config.max_redraws,
        })
    }

    pub fn model(&self) -> &Arc<CorrelationModel> {
        &self.model
    }

    /// Resolve the tag whose distribution the next candidate is drawn from.
    pub fn working_tag<R: Rng + ?Sized>(&self, start: TagId, rng: &mut R) -> TagId {
        if !self.model.correlations(start).is_empty() {
            return start;
        }

        let n = self.model.len();
        for _ in 0..self.max_redraws {
            let candidate = rng.random_range(0..n) as TagId;
            if self.model.contains(candidate) {
                trace!(start, candidate, "redrew working tag by raw index");
                return candidate;
            }
        }

        let tag = self.model.random_known(rng);
        debug!(
            start,
            tag,
            redraws = self.max_redraws,
            "raw-index redraws exhausted, using random known tag"
        );
        tag
    }

    /// Draw a set of `target` distinct tags containing `start`.
    ///
    /// `category_rng` drives working-tag redraws, `draw_rng` drives the
    /// weighted picks. A target of 1 returns `{start}` without consuming
    /// randomness.
    ///
    /// Fails with [`SamplingError::TargetUnreachable`] when `max_draws`
    /// candidates did not yield `target` distinct tags (e.g. the working
    /// tag has fewer related tags than requested).
    pub fn draw_set<C, D>(
        &self,
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

            let working = self.working_tag(start, category_rng);
            let r: f64 = draw_rng.random();
            tags.insert(weighted_pick(self.model.correlations(working), r));
            draws += 1;
        }

        Ok(tags)
    }
}
