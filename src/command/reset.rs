use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore},
        server::docker::Docker,
    },
    utils::{
        operator::{ConsoleOperator, Operator},
        path,
    },
};

#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Do not ask for confirmation
    #[clap(short = 'y', long)]
    pub yes: bool,

    /// Filter string to match Docker container names
    #[clap(long = "container-filter", default_value = "solo")]
    pub container_filter: String,

    /// Directory where models are downloaded
    #[clap(long = "download-dir")]
    pub download_dir: Option<PathBuf>,
}

pub async fn execute(args: ResetArgs) -> Result<(), SoloError> {
    if !args.yes
        && !ConsoleOperator.confirm(
            "This removes all solo containers, downloaded models and saved settings. Continue?",
            false,
        )
    {
        println!("Reset cancelled.");
        return Ok(());
    }

    remove_containers(&Docker::default(), &args.container_filter).await;

    let download_dir = args.download_dir.unwrap_or_else(path::download_dir);
    println!("Removing downloaded models...");
    match std::fs::remove_dir_all(&download_dir) {
        Ok(()) => println!(
            "{}",
            format!("Downloaded models removed from {}", download_dir.display()).green()
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No downloaded models directory found.")
        }
        Err(e) => eprintln!("{}", format!("Failed to remove downloaded models: {e}").red()),
    }

    let store = JsonFileStore::from_env()?;
    store.reset()?;
    println!("Removed saved settings.");
    println!("{}", "Reset complete. Clean setup is ready.".green());
    Ok(())
}

async fn remove_containers(docker: &Docker, filter: &str) {
    match docker.is_running().await {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            println!("Docker is not running, skipping container removal.");
            return;
        }
    }
    println!("Removing all solo Docker containers...");
    let ids = match docker.list_ids(filter, true).await {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("{}", format!("Failed to list containers: {e}").red());
            return;
        }
    };
    if ids.is_empty() {
        println!("No solo Docker containers found.");
        return;
    }
    let mut failed = 0;
    for id in &ids {
        if let Err(e) = docker.remove(id, true).await {
            tracing::warn!(container = %id, error = %e, "failed to remove container");
            failed += 1;
        }
    }
    if failed == 0 {
        println!("{}", "All solo Docker containers removed successfully.".green());
    } else {
        eprintln!("{}", format!("Failed to remove {failed} of {} containers.", ids.len()).red());
    }
}
