//! `reltag`: correlated-tag sampling for synthetic data generation.
//!
//! Given a table of `source tag -> (related tag, cumulative probability)`
//! rows, draw realistic related tags for generated records:
//!
//! - one related tag, uniform over a tag's row;
//! - a set of related tags from the exact weighted distribution
//!   (binary search over cumulative probabilities);
//! - the same set from an approximate, cache-accelerated distribution
//!   (uniform index into a per-tag unrolled list).
//!
//! All randomness is supplied by the caller, so results are reproducible for
//! a fixed generator and call order.
//!
//! Exposed modules:
//! - `model`: the immutable correlation table and its loader.
//! - `exact`: binary-search weighted set sampler.
//! - `cache`: direct-mapped cache of unrolled lists and the cached set sampler.
//! - `sampler`: `TagSampler`, the facade over all three queries.
//! - `config`: cache and draw-budget knobs.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod exact;
pub mod model;
pub mod sampler;

pub use cache::{unroll_into, CacheStats, UnrolledCache};
pub use config::SamplerConfig;
pub use error::{ConfigError, ModelError, SamplingError};
pub use exact::{weighted_pick, ExactSampler};
pub use model::{Correlation, CorrelationModel, TagId};
pub use sampler::TagSampler;
