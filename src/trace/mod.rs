//! Trace recording and counterfactual replay.
//!
//! This module provides:
//! - [`step::Step`] -- the immutable record of one environment transition.
//! - [`buffer::TraceBuffer`] -- the append-only episode buffer and its
//!   branch-point sampling.
//! - [`counterfactual::CounterfactualConstructor`] -- branch-and-replay over a
//!   borrowed snapshot using a caller-supplied [`TransitionModel`].
//! - [`recorder::Recorder`] -- drives episodes and exposes counterfactual
//!   generation on the recorded trace.

pub mod buffer;
pub mod counterfactual;
pub mod recorder;
pub mod step;

// Re-export the most commonly used items at the module level.
pub use buffer::{SamplingMethod, TraceBuffer};
pub use counterfactual::{CounterfactualConstructor, SymbolMapper, Transition, TransitionModel};
pub use recorder::{Counterfactual, Recorder};
pub use step::{Metadata, Step};

/// An ordered sequence of steps from one episode.
pub type Trajectory<S, A> = Vec<Step<S, A>>;
