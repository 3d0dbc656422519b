//! One module per `solo` subcommand, each with its clap args and an `execute` entry.

pub mod download;
pub mod list;
pub mod mcp;
pub mod query;
pub mod reset;
pub mod robo;
pub mod serve;
pub mod setup;
pub mod status;
pub mod stop;
