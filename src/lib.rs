//! Causal tracer: record agent-environment episodes and replay counterfactual
//! branches of them.
//!
//! A [`trace::Recorder`] drives an [`env::Environment`] with a policy and keeps
//! the episode in a [`trace::TraceBuffer`]. Counterfactuals agree with the
//! recorded episode up to a branch index, take a different action there, and
//! roll forward through a caller-supplied [`trace::TransitionModel`].

pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod trace;
