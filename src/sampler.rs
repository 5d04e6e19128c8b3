//! Related-tag sampling facade.
//!
//! [`TagSampler`] bundles the shared model, the exact sampler and one
//! worker-local unrolled cache behind the three generation queries:
//!
//! - [`TagSampler::related_of`]: one related tag, uniform over the row.
//! - [`TagSampler::exact_set`]: weighted set via binary search.
//! - [`TagSampler::cached_set`]: weighted set via the unrolled cache.
//!
//! Unknown tags never produce an error: they are replaced by a random known
//! tag. Use [`TagSampler::fork`] to get an independent sampler per worker.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::cache::{CacheStats, UnrolledCache};
use crate::config::SamplerConfig;
use crate::error::SamplingError;
use crate::exact::ExactSampler;
use crate::model::{CorrelationModel, TagId};

/// Consumer-facing sampler over one correlation model.
#[derive(Debug, Clone)]
pub struct TagSampler {
    config: SamplerConfig,
    exact: ExactSampler,
    cache: UnrolledCache,
}

impl TagSampler {
    /// Build a sampler with a cold cache.
    pub fn new(
        model: impl Into<Arc<CorrelationModel>>,
        config: SamplerConfig,
    ) -> Result<Self, SamplingError> {
        let model = model.into();
        let exact = ExactSampler::new(Arc::clone(&model), &config)?;
        let cache = UnrolledCache::new(model, &config)?;
        Ok(Self {
            config,
            exact,
            cache,
        })
    }

    /// Another sampler over the same model with its own cold cache.
    pub fn fork(&self) -> Self {
        Self {
            config: self.config,
            exact: self.exact.clone(),
            cache: self.cache.fork(),
        }
    }

    pub fn model(&self) -> &Arc<CorrelationModel> {
        self.exact.model()
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn cache(&self) -> &UnrolledCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut UnrolledCache {
        &mut self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// One related tag of `tag`, uniform over its related list.
    ///
    /// An unknown `tag` is first replaced by a uniformly random known tag.
    /// Both draws use `rng`.
    pub fn related_of<R: Rng + ?Sized>(&self, rng: &mut R, tag: TagId) -> TagId {
        let model = self.model();
        let source = model.resolve_known(tag, rng);
        if source != tag {
            debug!(tag, source, "unknown tag, substituted random known tag");
        }
        let row = model.correlations(source);
        row[rng.random_range(0..row.len())].related
    }

    /// Weighted set of `target` distinct tags containing `start`, drawn
    /// exactly from the model.
    pub fn exact_set<C, D>(
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
        self.exact.draw_set(category_rng, draw_rng, start, target)
    }

    /// Weighted set of `target` distinct tags containing `start`, drawn
    /// from the unrolled cache.
    pub fn cached_set<C, D>(
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
        self.cache.draw_set(category_rng, draw_rng, start, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const TABLE: &str = "\
1 2 0.5
1 3 1.0
2 1 0.3
2 3 0.6
2 5 1.0
3 8 1.0
";

    fn sampler() -> TagSampler {
        let model: CorrelationModel = TABLE.parse().expect("valid table");
        TagSampler::new(model, SamplerConfig::default().with_cache_capacity(16)).expect("sampler")
    }

    #[test]
    fn related_of_known_tag_stays_in_row() {
        let s = sampler();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            let t = s.related_of(&mut rng, 2);
            assert!([1, 3, 5].contains(&t), "t={t}");
        }
    }

    #[test]
    fn related_of_unknown_tag_substitutes() {
        let s = sampler();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let all_related = [1, 2, 3, 5, 8];
        for _ in 0..100 {
            let t = s.related_of(&mut rng, 99);
            assert!(all_related.contains(&t), "t={t}");
        }
    }

    #[test]
    fn related_of_is_uniform_over_row() {
        // Row 1 is weighted 50/50; row 2 is 30/30/40 but related_of ignores weights.
        let s = sampler();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut counts = [0usize; 3];
        for _ in 0..3_000 {
            match s.related_of(&mut rng, 2) {
                1 => counts[0] += 1,
                3 => counts[1] += 1,
                5 => counts[2] += 1,
                other => panic!("unexpected tag {other}"),
            }
        }
        for c in counts {
            assert!((800..1200).contains(&c), "counts={counts:?}");
        }
    }

    #[test]
    fn sets_include_start_and_have_target_size() {
        let mut s = sampler();
        let mut cat = ChaCha8Rng::seed_from_u64(3);
        let mut draw = ChaCha8Rng::seed_from_u64(4);

        let exact = s.exact_set(&mut cat, &mut draw, 2, 4).expect("reachable");
        assert_eq!(exact, BTreeSet::from([1, 2, 3, 5]));

        let cached = s.cached_set(&mut cat, &mut draw, 2, 4).expect("reachable");
        assert_eq!(cached, BTreeSet::from([1, 2, 3, 5]));
        assert_eq!(s.cache_stats().misses, 1);
    }

    #[test]
    fn unknown_start_never_errors() {
        let mut s = sampler();
        let mut cat = ChaCha8Rng::seed_from_u64(5);
        let mut draw = ChaCha8Rng::seed_from_u64(6);
        let exact = s.exact_set(&mut cat, &mut draw, 99, 2).expect("fallback");
        assert!(exact.contains(&99));
        let cached = s.cached_set(&mut cat, &mut draw, 99, 2).expect("fallback");
        assert!(cached.contains(&99));
    }

    #[test]
    fn fork_shares_model_with_cold_cache() {
        let mut s = sampler();
        let mut cat = ChaCha8Rng::seed_from_u64(7);
        let mut draw = ChaCha8Rng::seed_from_u64(8);
        s.cached_set(&mut cat, &mut draw, 1, 3).expect("reachable");
        assert!(s.cache().cached(1).is_some());

        let f = s.fork();
        assert!(Arc::ptr_eq(f.model(), s.model()));
        assert!(f.cache().cached(1).is_none());
        assert_eq!(f.cache_stats(), CacheStats::default());
        assert_eq!(f.config(), s.config());
    }

    #[test]
    fn forks_run_on_threads() {
        let s = sampler();
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let mut worker = s.fork();
                std::thread::spawn(move || {
                    let mut cat = ChaCha8Rng::seed_from_u64(seed);
                    let mut draw = ChaCha8Rng::seed_from_u64(seed + 100);
                    worker
                        .cached_set(&mut cat, &mut draw, 2, 3)
                        .expect("reachable")
                })
            })
            .collect();
        for h in handles {
            let got = h.join().expect("worker");
            assert_eq!(got.len(), 3);
            assert!(got.contains(&2));
        }
    }

    #[test]
    fn empty_model_rejected() {
        let err = TagSampler::new(CorrelationModel::default(), SamplerConfig::default())
            .expect_err("empty");
        assert_eq!(err, SamplingError::EmptyModel);
    }
}
