//! Environment abstractions and a reference implementation.
//!
//! Every environment implements the [`Environment`] trait so that the
//! recorder can drive it uniformly.
//!
//! Included environments:
//! - **Chain** ([`chain`]) -- a deterministic line of states with a single
//!   goal, useful for exercising counterfactual replays end to end.

pub mod chain;
pub mod traits;

// Re-export the core traits at the module level.
pub use traits::{EnvStep, Environment, Policy};
