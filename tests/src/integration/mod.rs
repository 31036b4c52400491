//! Cross-crate integration flows.

pub mod fork_flow;
pub mod pipe_flow;
