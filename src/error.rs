//! Error types raised by the trace buffer and the counterfactual constructor.
//!
//! Collaborator failures (transition model, environment, policy) never pass
//! through this type; they travel unchanged inside `anyhow::Error`.

use thiserror::Error;

/// Failures originating in the trace core itself.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Branch sampling needs at least two recorded steps.
    #[error("at least 2 steps are required for sampling, buffer length is {len}")]
    InsufficientTraceLength { len: usize },

    /// The requested sampling strategy has no implementation.
    #[error("invalid sampling method: {0}")]
    InvalidSamplingMethod(String),

    /// An intervention was requested at a position the trajectory does not have.
    #[error("branch index {index} out of range for trajectory of length {len}")]
    BranchIndexOutOfRange { index: usize, len: usize },

    /// Records carry rewards as JSON numbers, which cannot hold NaN or infinities.
    #[error("reward {reward} cannot be stored in a trace record")]
    NonFiniteReward { reward: f64 },

    /// A step could not be converted to or from its record form.
    #[error("trace record conversion failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
