//! A deterministic one-dimensional chain world.
//!
//! States run from `0` to `goal`. Action [`ADVANCE`] moves one position
//! toward the goal (saturating there), any other action leaves the agent in
//! place. Reaching the goal pays `1.0` and ends the episode.
//!
//! The same dynamics are exposed as a [`TransitionModel`] through
//! [`ChainEnv::model`], so counterfactual replays agree with what the live
//! environment would have done.

use anyhow::Result;
use serde_json::json;

use super::traits::{EnvStep, Environment};
use crate::trace::{Transition, TransitionModel};

/// Move one position toward the goal.
pub const ADVANCE: u32 = 1;
/// Remain at the current position.
pub const STAY: u32 = 0;

/// Human-readable label for a chain action.
pub fn chain_symbol(action: &u32) -> String {
    match *action {
        ADVANCE => "advance".into(),
        STAY => "stay".into(),
        other => other.to_string(),
    }
}

/// Policy that always advances.
pub fn always_advance(_state: &u32) -> Result<u32> {
    Ok(ADVANCE)
}

// ---------------------------------------------------------------------------
// Transition model
// ---------------------------------------------------------------------------

/// Pure chain dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainModel {
    goal: u32,
}

impl ChainModel {
    pub fn new(goal: u32) -> Self {
        Self { goal }
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }
}

impl TransitionModel<u32, u32> for ChainModel {
    fn transition(&self, state: &u32, action: &u32) -> Result<Transition<u32>> {
        let next_state = if *action == ADVANCE {
            state.saturating_add(1).min(self.goal)
        } else {
            *state
        };
        let reached = next_state == self.goal;
        Ok(Transition::new(
            next_state,
            if reached { 1.0 } else { 0.0 },
            reached,
        ))
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Stateful chain environment driven by the recorder.
#[derive(Debug, Clone)]
pub struct ChainEnv {
    model: ChainModel,
    position: u32,
    steps_taken: usize,
    done: bool,
}

impl ChainEnv {
    /// Create a chain whose terminal state is `goal`.
    pub fn new(goal: u32) -> Self {
        Self {
            model: ChainModel::new(goal),
            position: 0,
            steps_taken: 0,
            done: false,
        }
    }

    /// The dynamics of this chain as a standalone transition model.
    pub fn model(&self) -> ChainModel {
        self.model
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Default for ChainEnv {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Environment for ChainEnv {
    type State = u32;
    type Action = u32;

    fn reset(&mut self) -> Result<u32> {
        self.position = 0;
        self.steps_taken = 0;
        self.done = false;

        tracing::debug!(goal = self.model.goal(), "chain env reset");
        Ok(self.position)
    }

    fn step(&mut self, action: &u32) -> Result<EnvStep<u32>> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }

        let transition = self.model.transition(&self.position, action)?;
        self.position = transition.next_state;
        self.steps_taken += 1;
        self.done = transition.done;

        let mut step = EnvStep::new(transition.next_state, transition.reward, transition.done);
        step.info.insert("steps_taken".into(), json!(self.steps_taken));
        step.info.insert("goal".into(), json!(self.model.goal()));
        Ok(step)
    }
}
