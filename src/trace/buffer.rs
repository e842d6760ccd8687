//! Append-only episode buffer and branch-point sampling.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::step::{Metadata, Step};
use super::Trajectory;
use crate::error::TraceError;

// ---------------------------------------------------------------------------
// Sampling strategy
// ---------------------------------------------------------------------------

/// Strategy used to choose the step at which a counterfactual branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SamplingMethod {
    /// Uniform over every index except the last.
    #[default]
    Random,
}

impl SamplingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
        }
    }
}

impl FromStr for SamplingMethod {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            other => Err(TraceError::InvalidSamplingMethod(other.to_string())),
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trace buffer
// ---------------------------------------------------------------------------

/// Ordered record of a single episode, insertion order being temporal order.
///
/// The buffer never hands out mutable views of its contents: [`trace`]
/// returns an owned copy and [`as_slice`] is read-only.
///
/// [`trace`]: TraceBuffer::trace
/// [`as_slice`]: TraceBuffer::as_slice
#[derive(Debug, Clone, PartialEq)]
pub struct TraceBuffer<S, A> {
    steps: Vec<Step<S, A>>,
}

impl<S, A> Default for TraceBuffer<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> TraceBuffer<S, A> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step. Transition consistency is not checked.
    pub fn record(&mut self, step: Step<S, A>) {
        self.steps.push(step);
    }

    /// Drop every recorded step, starting a new episode.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Read-only view of the recorded steps.
    pub fn as_slice(&self) -> &[Step<S, A>] {
        &self.steps
    }

    /// Step at `index`, if recorded.
    pub fn get(&self, index: usize) -> Option<&Step<S, A>> {
        self.steps.get(index)
    }

    /// Sample a branch index using the strategy named `method`.
    ///
    /// The length check happens before the name is resolved, so an empty
    /// buffer reports `InsufficientTraceLength` whatever the method.
    pub fn sample<R: Rng + ?Sized>(&self, method: &str, rng: &mut R) -> Result<usize, TraceError> {
        self.ensure_sampleable()?;
        let method: SamplingMethod = method.parse()?;
        self.sample_with(method, rng)
    }

    /// Sample a branch index with an already-resolved strategy.
    ///
    /// `Random` draws uniformly from `[0, len - 2]`: branching at the final
    /// step would leave nothing to replay.
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        method: SamplingMethod,
        rng: &mut R,
    ) -> Result<usize, TraceError> {
        self.ensure_sampleable()?;
        match method {
            SamplingMethod::Random => Ok(rng.gen_range(0..=self.steps.len() - 2)),
        }
    }

    fn ensure_sampleable(&self) -> Result<(), TraceError> {
        if self.steps.len() < 2 {
            return Err(TraceError::InsufficientTraceLength {
                len: self.steps.len(),
            });
        }
        Ok(())
    }
}

impl<S: Clone, A: Clone> TraceBuffer<S, A> {
    /// Independent copy of the full trajectory.
    pub fn trace(&self) -> Trajectory<S, A> {
        self.steps.clone()
    }
}

impl<S: Serialize, A: Serialize> TraceBuffer<S, A> {
    /// Flatten every step into a plain record, in order.
    ///
    /// This is the serialisation boundary for anything that persists or
    /// analyses traces outside the process.
    pub fn to_records(&self) -> Result<Vec<Metadata>, TraceError> {
        self.steps.iter().map(Step::to_record).collect()
    }
}

impl<S: DeserializeOwned, A: DeserializeOwned> TraceBuffer<S, A> {
    /// Rebuild a buffer from records produced by [`TraceBuffer::to_records`].
    pub fn from_records(records: Vec<Metadata>) -> Result<Self, TraceError> {
        let steps = records
            .into_iter()
            .map(Step::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl<S, A> FromIterator<Step<S, A>> for TraceBuffer<S, A> {
    fn from_iter<I: IntoIterator<Item = Step<S, A>>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
