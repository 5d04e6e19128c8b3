//! Draw related-tag sets from a small correlation table, exact vs cached.
//!
//! Run with `RUST_LOG=reltag=debug` to see model loading and cache activity.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reltag::{CorrelationModel, SamplerConfig, TagSampler};
use tracing_subscriber::EnvFilter;

const TABLE: &str = "\
0 1 0.40
0 2 0.70
0 3 0.90
0 4 1.00
1 0 0.50
1 5 0.80
1 6 1.00
2 0 0.25
2 3 0.50
2 7 1.00
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let model: CorrelationModel = TABLE.parse()?;
    let config = SamplerConfig::default().with_cache_capacity(8);
    let mut sampler = TagSampler::new(model, config)?;

    let mut cat = ChaCha8Rng::seed_from_u64(7);
    let mut draw = ChaCha8Rng::seed_from_u64(8);

    for start in [0, 1, 2, 42] {
        let exact = sampler.exact_set(&mut cat, &mut draw, start, 3)?;
        let cached = sampler.cached_set(&mut cat, &mut draw, start, 3)?;
        let one = sampler.related_of(&mut cat, start);
        println!("start={start:2}  related={one}  exact={exact:?}  cached={cached:?}");
    }

    let stats = sampler.cache_stats();
    println!(
        "cache: hits={} misses={} evictions={} hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.evictions,
        stats.hit_rate()
    );

    Ok(())
}
