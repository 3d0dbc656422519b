//! This is the main entry point for solo.

use colored::Colorize;
use solo::{cli, error::SoloError};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SOLO_LOG";

fn main() {
    let default_level = if cfg!(debug_assertions) { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli::parse(None) {
        Ok(()) => {}
        Err(SoloError::Exit(code)) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", format!("error: {e}").red());
            std::process::exit(e.exit_code());
        }
    }
}
