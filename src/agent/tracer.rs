//! The causal tracer agent: records observed transitions and contrasts the
//! episode with a counterfactual in which one decision went the other way.

use std::fmt::Debug;

use anyhow::Result;
use tracing::{debug, info};

use crate::env::EnvStep;
use crate::trace::{Counterfactual, Recorder, SamplingMethod, Step, TransitionModel};

// ---------------------------------------------------------------------------
// Agent capability set
// ---------------------------------------------------------------------------

/// The capabilities every agent exposes to an episode driver.
pub trait Agent {
    type State;
    type Action;
    /// What one call to [`Agent::train`] produces.
    type Output;

    /// Take note of one environment transition.
    fn observe(
        &mut self,
        state: Self::State,
        action: Self::Action,
        outcome: EnvStep<Self::State>,
    ) -> Result<()>;

    /// Forget the current episode.
    fn reset(&mut self);

    /// Learn from whatever has been observed since the last reset.
    fn train(&mut self) -> Result<Self::Output>;
}

// ---------------------------------------------------------------------------
// Contrast functions
// ---------------------------------------------------------------------------

/// Derives the alternative action to take at a sampled branch step.
pub type ContrastFn<S, A> = Box<dyn Fn(&Step<S, A>) -> Result<A> + Send + Sync>;

/// Swap binary actions (`0` <-> `1`); any other action is returned unchanged.
pub fn flip_binary_action<S, A>(step: &Step<S, A>) -> Result<A>
where
    A: Clone + PartialEq + From<u8>,
{
    let action = step.action();
    if *action == A::from(0) {
        Ok(A::from(1))
    } else if *action == A::from(1) {
        Ok(A::from(0))
    } else {
        Ok(action.clone())
    }
}

// ---------------------------------------------------------------------------
// Causal tracer
// ---------------------------------------------------------------------------

/// Agent that traces its episode and produces contrastive counterfactuals.
pub struct CausalTracer<S, A, M> {
    recorder: Recorder<S, A, M>,
    /// Name of the branch sampling strategy.
    intervention_method: String,
    contrast: ContrastFn<S, A>,
}

impl<S, A, M> CausalTracer<S, A, M>
where
    S: Clone + 'static,
    A: Clone + PartialEq + From<u8> + 'static,
    M: TransitionModel<S, A>,
{
    /// Create a tracer that samples branches at random and flips binary
    /// actions at the branch point.
    pub fn new(recorder: Recorder<S, A, M>) -> Self {
        Self {
            recorder,
            intervention_method: SamplingMethod::Random.to_string(),
            contrast: Box::new(flip_binary_action::<S, A>),
        }
    }
}

impl<S, A, M> CausalTracer<S, A, M>
where
    S: Clone,
    A: Clone,
    M: TransitionModel<S, A>,
{
    /// Create a tracer with an explicit contrast function.
    pub fn with_contrast(
        recorder: Recorder<S, A, M>,
        contrast: impl Fn(&Step<S, A>) -> Result<A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            recorder,
            intervention_method: SamplingMethod::Random.to_string(),
            contrast: Box::new(contrast),
        }
    }

    /// Use the sampling strategy named `method` when choosing branch points.
    ///
    /// The name is resolved at training time.
    pub fn with_intervention_method(mut self, method: impl Into<String>) -> Self {
        self.intervention_method = method.into();
        self
    }

    pub fn recorder(&self) -> &Recorder<S, A, M> {
        &self.recorder
    }
}

impl<S, A, M> Agent for CausalTracer<S, A, M>
where
    S: Clone + Debug,
    A: Clone + Debug,
    M: TransitionModel<S, A>,
{
    type State = S;
    type Action = A;
    type Output = Option<Counterfactual<S, A>>;

    fn observe(&mut self, state: S, action: A, outcome: EnvStep<S>) -> Result<()> {
        let symbol = self.recorder.symbolize(&action);
        self.recorder.record(
            Step::new(state, action, outcome.reward, outcome.next_state, outcome.done)
                .with_metadata(outcome.info)
                .with_symbol(symbol),
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.recorder.reset();
    }

    /// Branch the observed episode once. Returns `None` when fewer than two
    /// steps have been observed.
    fn train(&mut self) -> Result<Self::Output> {
        if self.recorder.buffer().len() < 2 {
            debug!(
                steps = self.recorder.buffer().len(),
                "too few steps to branch, skipping"
            );
            return Ok(None);
        }

        let contrast = &self.contrast;
        let counterfactual = self
            .recorder
            .sample_counterfactual(&self.intervention_method, contrast)?;

        info!(
            branch_index = counterfactual.branch_index,
            original_action = ?counterfactual.original_action,
            steps = counterfactual.steps.len(),
            "generated counterfactual"
        );
        for (i, step) in counterfactual.steps.iter().enumerate() {
            info!(
                step = i,
                state = ?step.state(),
                action = %step.symbol(),
                reward = step.reward(),
                next_state = ?step.next_state(),
                done = step.done(),
                "counterfactual step"
            );
        }

        Ok(Some(counterfactual))
    }
}
