use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore},
        server::docker::{Docker, DockerError},
    },
};

#[derive(Parser, Debug, Default)]
pub struct StatusArgs {}

pub async fn execute(_args: StatusArgs) -> Result<(), SoloError> {
    let store = JsonFileStore::from_env()?;
    let config = store.load_or_default();

    println!("{}", "Configured server".cyan().bold());
    match &config.server {
        Some(server) => {
            println!("  Type:  {}", server.server_type.as_deref().unwrap_or("none"));
            if let Some(port) = server.port {
                println!("  Port:  {port}");
            }
            if let Some(model) = &server.model {
                println!("  Model: {model}");
            }
        }
        None => println!("  none (run `solo setup`)"),
    }
    if let Some(arms) = config.lerobot.as_ref().and_then(|l| l.calibrated_arms()) {
        println!(
            "  Arms:  {} leader {} / follower {}",
            arms.kind.label(),
            arms.leader_port,
            arms.follower_port
        );
    }

    println!("\n{}", "Containers".cyan().bold());
    let docker = Docker::default();
    match docker.is_running().await {
        Ok(true) => {}
        Ok(false) => {
            println!("  Docker is not running.");
            return Ok(());
        }
        Err(DockerError::NotInstalled) => {
            println!("  Docker is not installed.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    let containers = docker.describe("solo").await?;
    if containers.is_empty() {
        println!("  No solo containers found.");
    }
    for container in containers {
        let status = if container.is_up() {
            container.status.green()
        } else {
            container.status.yellow()
        };
        println!("  {:<16} {status}  {}", container.name, container.ports);
    }
    Ok(())
}
