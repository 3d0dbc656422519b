//! A small MCP server offering countdown timers over stdio.
//!
//! # Tools
//!
//! - `start_timer { hours, minutes, seconds }` returns `{ timer_id, message }`; a zero
//!   duration is rejected.
//! - `cancel_timer { timer_id }` stops a running timer.
//! - `list_timers {}` returns `{ active_timers: [{ timer_id, remaining_seconds }] }`.
//!
//! Finished timers remove themselves from the registry.
pub mod server;
pub mod timer;
