//! Counterfactual construction: branch a recorded trajectory at one step and
//! replay a transition model forward from there.
//!
//! The constructor holds no trajectory of its own. Every call reads a borrowed
//! snapshot and returns a freshly built trajectory, so the recorded episode is
//! never touched.

use std::marker::PhantomData;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::step::Step;
use super::Trajectory;
use crate::error::TraceError;

// ---------------------------------------------------------------------------
// Transition model
// ---------------------------------------------------------------------------

/// Outcome of applying an action to a state under a transition model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<S> {
    pub next_state: S,
    pub reward: f64,
    pub done: bool,
}

impl<S> Transition<S> {
    pub fn new(next_state: S, reward: f64, done: bool) -> Self {
        Self {
            next_state,
            reward,
            done,
        }
    }
}

/// Simulated environment dynamics, `(state, action) -> (next_state, reward, done)`.
///
/// Implementations are trusted to be deterministic for a fixed pair; nothing
/// here checks it. Errors are returned to the caller untouched.
pub trait TransitionModel<S, A> {
    fn transition(&self, state: &S, action: &A) -> Result<Transition<S>>;
}

impl<S, A, F> TransitionModel<S, A> for F
where
    F: Fn(&S, &A) -> Result<Transition<S>>,
{
    fn transition(&self, state: &S, action: &A) -> Result<Transition<S>> {
        self(state, action)
    }
}

/// Maps an action to a human-readable label.
pub type SymbolMapper<A> = Box<dyn Fn(&A) -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// Constructor
// ---------------------------------------------------------------------------

/// Builds alternate trajectories that share a prefix with a recorded one.
pub struct CounterfactualConstructor<S, A, M> {
    model: M,
    /// Without a mapper every action gets an empty label.
    mapper: Option<SymbolMapper<A>>,
    _state: PhantomData<fn(S) -> S>,
}

impl<S, A, M> CounterfactualConstructor<S, A, M>
where
    S: Clone,
    A: Clone,
    M: TransitionModel<S, A>,
{
    /// Create a constructor without a symbol mapper.
    pub fn new(model: M) -> Self {
        Self {
            model,
            mapper: None,
            _state: PhantomData,
        }
    }

    /// Replace the symbol mapper.
    pub fn with_mapper(mut self, mapper: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        self.mapper = Some(Box::new(mapper));
        self
    }

    /// Label `action` with the configured mapper.
    pub fn symbolize(&self, action: &A) -> String {
        self.mapper
            .as_ref()
            .map(|mapper| mapper(action))
            .unwrap_or_default()
    }

    /// Branch `snapshot` at `index` by taking `new_action` there.
    ///
    /// The first `index` steps are copied verbatim. The branch step applies
    /// `new_action` to the recorded state at `index`. If it is not terminal,
    /// the rollout continues for the remaining positions of the snapshot,
    /// each time feeding the previous replay step's `next_state` and the
    /// previous replay step's action back into the model. The recorded
    /// actions after the branch are not consulted. Replay stops at the first
    /// terminal step, so the result holds between `index + 1` and
    /// `snapshot.len()` steps.
    pub fn intervene(
        &self,
        snapshot: &[Step<S, A>],
        index: usize,
        new_action: A,
    ) -> Result<Trajectory<S, A>> {
        let len = snapshot.len();
        let branch = snapshot
            .get(index)
            .ok_or(TraceError::BranchIndexOutOfRange { index, len })?;

        let mut steps = Vec::with_capacity(len);
        steps.extend_from_slice(&snapshot[..index]);

        let mut state = branch.state().clone();
        let symbol = self.symbolize(&new_action);

        for _ in index..len {
            let Transition {
                next_state,
                reward,
                done,
            } = self.model.transition(&state, &new_action)?;

            steps.push(
                Step::new(state, new_action.clone(), reward, next_state.clone(), done)
                    .with_symbol(symbol.clone()),
            );

            if done {
                break;
            }
            state = next_state;
        }

        Ok(steps)
    }
}
