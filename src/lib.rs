//! solo: sets up local inference servers and drives leader/follower robot arms through
//! an external robotics framework.

pub mod cli;
pub mod command;
pub mod error;
pub mod internal;
pub mod utils;
