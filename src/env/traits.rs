//! Core environment and policy traits.
//!
//! The recorder drives any type implementing [`Environment`] with any
//! [`Policy`], so concrete worlds and agents stay outside the trace core.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::trace::Metadata;

/// What the environment reports after one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvStep<S> {
    /// The state reached by the action.
    pub next_state: S,
    /// The scalar reward for the transition.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Arbitrary extra information from the environment.
    #[serde(default)]
    pub info: Metadata,
}

impl<S> EnvStep<S> {
    /// A step result with an empty `info` map.
    pub fn new(next_state: S, reward: f64, done: bool) -> Self {
        Self {
            next_state,
            reward,
            done,
            info: Metadata::new(),
        }
    }
}

/// The environment capability set the recorder needs.
///
/// Calls are synchronous; errors propagate to whoever is driving the episode.
pub trait Environment {
    type State;
    type Action;

    /// Reset the environment and return the initial state of a new episode.
    fn reset(&mut self) -> Result<Self::State>;

    /// Apply `action` and return the resulting transition.
    fn step(&mut self, action: &Self::Action) -> Result<EnvStep<Self::State>>;
}

/// Maps a state to the action the agent wants to take.
pub trait Policy<S, A> {
    fn select_action(&mut self, state: &S) -> Result<A>;
}

impl<S, A, F> Policy<S, A> for F
where
    F: FnMut(&S) -> Result<A>,
{
    fn select_action(&mut self, state: &S) -> Result<A> {
        self(state)
    }
}
