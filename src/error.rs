//! Error types.

use crate::model::TagId;

/// Errors raised while building a [`CorrelationModel`](crate::CorrelationModel).
///
/// Any of these means no model was produced: loading is all-or-nothing.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read correlation table: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected 3 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: invalid {field} `{value}`")]
    Parse {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("tag {source_tag}: cumulative probability must be finite and in [0, 1] (got {value})")]
    InvalidProbability { source_tag: TagId, value: f64 },

    #[error("tag {source_tag}: cumulative probability decreased from {previous} to {value}")]
    Decreasing {
        source_tag: TagId,
        previous: f64,
        value: f64,
    },
}

/// Invalid [`SamplerConfig`](crate::SamplerConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    Zero { field: &'static str },
}

/// Errors returned by the set samplers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplingError {
    #[error("correlation model has no categories")]
    EmptyModel,

    #[error("target size must be > 0")]
    ZeroTarget,

    #[error("target of {target} tags unreachable: {reached} distinct after {draws} draws")]
    TargetUnreachable {
        target: usize,
        reached: usize,
        draws: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
