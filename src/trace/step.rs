//! The atomic transition record stored in a trace.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TraceError;

/// Auxiliary key/value data attached to a step (usually the environment's `info`).
pub type Metadata = Map<String, Value>;

/// One recorded environment transition.
///
/// A step is immutable once built: fields are private and only exposed through
/// accessors. `next_state` is expected to be the environment's response to
/// applying `action` to `state`; nothing here checks that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<S, A> {
    state: S,
    action: A,
    reward: f64,
    next_state: S,
    done: bool,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    symbol: String,
}

impl<S, A> Step<S, A> {
    /// Build a step with empty metadata and an empty symbol.
    ///
    /// Each call allocates its own metadata map.
    pub fn new(state: S, action: A, reward: f64, next_state: S, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            metadata: Metadata::new(),
            symbol: String::new(),
        }
    }

    /// Attach metadata (replaces the empty default).
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach the human-readable action label.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// State of the environment before the action.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Action submitted on `state`.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Reward received for the transition.
    pub fn reward(&self) -> f64 {
        self.reward
    }

    /// State of the environment after the action.
    pub fn next_state(&self) -> &S {
        &self.next_state
    }

    /// Whether `next_state` is terminal.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Auxiliary data attached to the step, empty unless set.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Label produced by the symbolic mapper for `action`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl<S: Serialize, A: Serialize> Step<S, A> {
    /// Flatten the step into a plain key/value record with the keys
    /// `state, action, reward, next_state, done, metadata, symbol`.
    ///
    /// Fails with [`TraceError::NonFiniteReward`] when the reward is NaN or
    /// infinite, since the record could not be read back.
    pub fn to_record(&self) -> Result<Metadata, TraceError> {
        if !self.reward.is_finite() {
            return Err(TraceError::NonFiniteReward {
                reward: self.reward,
            });
        }
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<S: DeserializeOwned, A: DeserializeOwned> Step<S, A> {
    /// Rebuild a step from a record produced by [`Step::to_record`].
    pub fn from_record(record: Metadata) -> Result<Self, TraceError> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}
