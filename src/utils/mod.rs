//! Utilities module aggregator exposing operator prompts, paths, subprocesses and testing helpers.

pub mod operator;
pub mod path;
pub mod process;
pub mod test;
