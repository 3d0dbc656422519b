//! Internal layer: session config, hardware probing, Hugging Face accounts, model
//! servers, the MCP timer and the robot-arm workflows.

pub mod config;
pub mod hardware;
pub mod hub;
pub mod mcp;
pub mod robot;
pub mod server;
