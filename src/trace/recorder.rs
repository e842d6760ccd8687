//! Episode recording and counterfactual generation.
//!
//! The [`Recorder`] drives an [`Environment`] with a [`Policy`], storing
//! every transition in its [`TraceBuffer`]. Counterfactuals are built from a
//! read-only view of that buffer and never modify it.

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::buffer::TraceBuffer;
use super::counterfactual::{CounterfactualConstructor, TransitionModel};
use super::step::Step;
use super::Trajectory;
use crate::env::{Environment, Policy};

/// A counterfactual trajectory together with where it branched.
#[derive(Debug, Clone, PartialEq)]
pub struct Counterfactual<S, A> {
    /// Position in the recorded trace at which the new action was taken.
    pub branch_index: usize,
    /// The action recorded at `branch_index` before the intervention.
    pub original_action: A,
    /// The full alternate trajectory.
    pub steps: Trajectory<S, A>,
}

/// Owns one episode buffer and the constructor used to branch from it.
pub struct Recorder<S, A, M> {
    buffer: TraceBuffer<S, A>,
    constructor: CounterfactualConstructor<S, A, M>,
    rng: ChaCha8Rng,
}

impl<S, A, M> Recorder<S, A, M>
where
    S: Clone,
    A: Clone,
    M: TransitionModel<S, A>,
{
    /// Create a recorder replaying counterfactuals through `model`.
    ///
    /// Branch sampling uses an entropy-seeded generator; call
    /// [`Recorder::with_seed`] for reproducible draws.
    pub fn new(model: M) -> Self {
        Self {
            buffer: TraceBuffer::new(),
            constructor: CounterfactualConstructor::new(model),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Label actions with `mapper` in recorded and replayed steps.
    pub fn with_mapper(mut self, mapper: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        self.constructor = self.constructor.with_mapper(mapper);
        self
    }

    /// Reseed the branch sampler.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn buffer(&self) -> &TraceBuffer<S, A> {
        &self.buffer
    }

    /// Independent copy of the recorded trajectory.
    pub fn trace(&self) -> Trajectory<S, A> {
        self.buffer.trace()
    }

    /// Label `action` with the configured mapper.
    pub fn symbolize(&self, action: &A) -> String {
        self.constructor.symbolize(action)
    }

    /// Append an externally observed step to the current episode.
    pub fn record(&mut self, step: Step<S, A>) {
        self.buffer.record(step);
    }

    /// Forget the current episode.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Run one episode of `environment` under `policy`, recording every step.
    ///
    /// The buffer is cleared first. The loop stops after the first terminal
    /// step or after `max_steps` steps, whichever comes first. Environment
    /// and policy errors are returned as-is; steps recorded before the
    /// failure stay in the buffer.
    pub fn trace_episode<E, P>(
        &mut self,
        environment: &mut E,
        policy: &mut P,
        max_steps: usize,
    ) -> Result<&TraceBuffer<S, A>>
    where
        E: Environment<State = S, Action = A>,
        P: Policy<S, A>,
    {
        self.buffer.clear();
        let mut state = environment.reset()?;

        for _ in 0..max_steps {
            let action = policy.select_action(&state)?;
            let outcome = environment.step(&action)?;
            let symbol = self.symbolize(&action);
            let done = outcome.done;

            self.buffer.record(
                Step::new(
                    state,
                    action,
                    outcome.reward,
                    outcome.next_state.clone(),
                    done,
                )
                .with_symbol(symbol),
            );

            if done {
                break;
            }
            state = outcome.next_state;
        }

        Ok(&self.buffer)
    }

    /// Sample a branch index, derive the new action from the recorded step
    /// there, and build the resulting counterfactual.
    pub fn sample_counterfactual<F>(
        &mut self,
        method: &str,
        new_action: F,
    ) -> Result<Counterfactual<S, A>>
    where
        F: FnOnce(&Step<S, A>) -> Result<A>,
    {
        let branch_index = self.buffer.sample(method, &mut self.rng)?;
        let original = &self.buffer.as_slice()[branch_index];
        let original_action = original.action().clone();
        let action = new_action(original)?;

        let steps = self.generate_counterfactual(branch_index, action)?;
        Ok(Counterfactual {
            branch_index,
            original_action,
            steps,
        })
    }

    /// Branch the recorded trajectory at `index` by taking `new_action` there.
    pub fn generate_counterfactual(&self, index: usize, new_action: A) -> Result<Trajectory<S, A>> {
        self.constructor
            .intervene(self.buffer.as_slice(), index, new_action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::chain::{always_advance, chain_symbol, ChainEnv, ChainModel, ADVANCE, STAY};
    use crate::env::EnvStep;
    use crate::error::TraceError;

    fn recorder() -> Recorder<u32, u32, ChainModel> {
        Recorder::new(ChainModel::new(3))
            .with_mapper(chain_symbol)
            .with_seed(11)
    }

    fn flip(step: &Step<u32, u32>) -> Result<u32> {
        Ok(if *step.action() == ADVANCE { STAY } else { ADVANCE })
    }

    #[test]
    fn trace_episode_records_reference_trajectory() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(3);
        let mut policy = always_advance;

        let buffer = rec.trace_episode(&mut env, &mut policy, 1000).unwrap();
        assert_eq!(buffer.len(), 3);

        let trace = buffer.trace();
        let summary: Vec<(u32, u32, f64, bool)> = trace
            .iter()
            .map(|s| (*s.state(), *s.next_state(), s.reward(), s.done()))
            .collect();
        assert_eq!(
            summary,
            vec![(0, 1, 0.0, false), (1, 2, 0.0, false), (2, 3, 1.0, true)]
        );
        assert!(trace.iter().all(|s| s.symbol() == "advance"));
        // Recorded steps start with fresh, empty metadata.
        assert!(trace.iter().all(|s| s.metadata().is_empty()));
    }

    #[test]
    fn trace_episode_respects_max_steps() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(10);
        let mut policy = always_advance;

        let buffer = rec.trace_episode(&mut env, &mut policy, 4).unwrap();
        assert_eq!(buffer.len(), 4);
        assert!(!buffer.as_slice()[3].done());

        let buffer = rec.trace_episode(&mut env, &mut policy, 0).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn trace_episode_clears_previous_episode() {
        let mut rec = recorder();
        rec.record(Step::new(9, 9, 0.0, 9, false));
        rec.record(Step::new(9, 9, 0.0, 9, false));

        let mut env = ChainEnv::new(1);
        let mut policy = always_advance;
        let buffer = rec.trace_episode(&mut env, &mut policy, 10).unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(*buffer.as_slice()[0].state(), 0);
    }

    #[test]
    fn policy_errors_propagate() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(3);
        let mut calls = 0;
        let mut policy = |_state: &u32| -> Result<u32> {
            calls += 1;
            if calls > 1 {
                anyhow::bail!("policy gave up");
            }
            Ok(ADVANCE)
        };

        let err = rec.trace_episode(&mut env, &mut policy, 10).unwrap_err();
        assert_eq!(err.to_string(), "policy gave up");
        // The step taken before the failure is still recorded.
        assert_eq!(rec.buffer().len(), 1);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("world {phase} failed after {steps} steps")]
    struct WorldFailure {
        phase: &'static str,
        steps: usize,
    }

    /// Advances like the chain world but fails on reset or after `fail_after` steps.
    struct BrokenWorld {
        fail_on_reset: bool,
        fail_after: usize,
        steps: usize,
    }

    impl Environment for BrokenWorld {
        type State = u32;
        type Action = u32;

        fn reset(&mut self) -> Result<u32> {
            if self.fail_on_reset {
                return Err(WorldFailure {
                    phase: "reset",
                    steps: self.steps,
                }
                .into());
            }
            self.steps = 0;
            Ok(0)
        }

        fn step(&mut self, _action: &u32) -> Result<EnvStep<u32>> {
            if self.steps == self.fail_after {
                return Err(WorldFailure {
                    phase: "step",
                    steps: self.steps,
                }
                .into());
            }
            self.steps += 1;
            Ok(EnvStep::new(self.steps as u32, 0.0, false))
        }
    }

    #[test]
    fn environment_step_errors_propagate() {
        let mut rec = recorder();
        let mut env = BrokenWorld {
            fail_on_reset: false,
            fail_after: 2,
            steps: 0,
        };

        let err = rec.trace_episode(&mut env, &mut always_advance, 10).unwrap_err();
        let failure = err.downcast_ref::<WorldFailure>().unwrap();
        assert_eq!(failure.phase, "step");
        assert_eq!(failure.steps, 2);
        assert_eq!(rec.buffer().len(), 2);
    }

    #[test]
    fn environment_reset_errors_propagate() {
        let mut rec = recorder();
        rec.record(Step::new(9, 9, 0.0, 9, false));
        let mut env = BrokenWorld {
            fail_on_reset: true,
            fail_after: 0,
            steps: 0,
        };

        let err = rec.trace_episode(&mut env, &mut always_advance, 10).unwrap_err();
        let failure = err.downcast_ref::<WorldFailure>().unwrap();
        assert_eq!(failure.phase, "reset");
        // The previous episode is gone even though no new step was recorded.
        assert!(rec.buffer().is_empty());
    }

    #[test]
    fn generate_counterfactual_matches_reference_scenario() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(3);
        rec.trace_episode(&mut env, &mut always_advance, 1000).unwrap();

        let before = rec.trace();
        let cf = rec.generate_counterfactual(0, STAY).unwrap();
        assert_eq!(cf.len(), 3);
        assert!(cf.iter().all(|s| *s.state() == 0 && *s.next_state() == 0));
        assert!(cf.iter().all(|s| !s.done() && s.symbol() == "stay"));
        assert_eq!(rec.trace(), before);
    }

    #[test]
    fn sample_counterfactual_branches_inside_the_trace() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(3);
        rec.trace_episode(&mut env, &mut always_advance, 1000).unwrap();
        let recorded = rec.trace();

        for _ in 0..20 {
            let cf = rec.sample_counterfactual("random", flip).unwrap();
            assert!(cf.branch_index <= 1);
            assert_eq!(cf.original_action, ADVANCE);
            assert_eq!(&cf.steps[..cf.branch_index], &recorded[..cf.branch_index]);
            assert_eq!(*cf.steps[cf.branch_index].action(), STAY);
            assert_eq!(cf.steps.len(), recorded.len());
        }
        assert_eq!(rec.trace(), recorded);
    }

    #[test]
    fn seeded_recorders_sample_the_same_branches() {
        let mut env = ChainEnv::new(8);
        let mut a = recorder();
        let mut b = recorder();
        a.trace_episode(&mut env, &mut always_advance, 1000).unwrap();
        b.trace_episode(&mut env, &mut always_advance, 1000).unwrap();

        for _ in 0..10 {
            let x = a.sample_counterfactual("random", flip).unwrap();
            let y = b.sample_counterfactual("random", flip).unwrap();
            assert_eq!(x, y);
        }
    }

    #[test]
    fn sample_counterfactual_surfaces_sampling_errors() {
        let mut rec = recorder();
        let err = rec.sample_counterfactual("random", flip).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TraceError>(),
            Some(TraceError::InsufficientTraceLength { len: 0 })
        ));

        let mut env = ChainEnv::new(3);
        rec.trace_episode(&mut env, &mut always_advance, 1000).unwrap();
        let err = rec.sample_counterfactual("bogus", flip).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TraceError>(),
            Some(TraceError::InvalidSamplingMethod(_))
        ));
    }

    #[test]
    fn action_generator_errors_propagate() {
        let mut rec = recorder();
        let mut env = ChainEnv::new(3);
        rec.trace_episode(&mut env, &mut always_advance, 1000).unwrap();

        let err = rec
            .sample_counterfactual("random", |_step: &Step<u32, u32>| -> Result<u32> {
                anyhow::bail!("no alternative")
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "no alternative");
    }
}
