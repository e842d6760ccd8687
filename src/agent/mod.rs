//! Agent module: the causal tracer agent.
//!
//! The [`CausalTracer`] observes transitions as an agent would, keeps them in
//! a [`Recorder`](crate::trace::Recorder), and on `train` replays a
//! counterfactual branch of the episode it just saw.

pub mod tracer;

// Re-export the primary types for convenient access.
pub use tracer::{flip_binary_action, Agent, CausalTracer, ContrastFn};
