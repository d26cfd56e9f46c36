//! Named single-choice votes: creation, ballot casting, timed close,
//! and live summary rendering.

pub mod render;
pub mod workflow;

pub use workflow::{Vote, VoteWorkflow};
