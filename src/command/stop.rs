use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::server::{ServerType, docker::Docker},
};

#[derive(Parser, Debug, Default)]
pub struct StopArgs {
    /// Server to stop; stops every solo container when omitted
    #[clap(short = 's', long = "server", value_enum)]
    pub server: Option<ServerType>,
}

/// Containers `stop` acts on.
pub fn targets(server: Option<ServerType>) -> Vec<&'static str> {
    match server {
        Some(server) => server.container_name().into_iter().collect(),
        None => ServerType::ALL.iter().filter_map(|s| s.container_name()).collect(),
    }
}

pub async fn execute(args: StopArgs) -> Result<(), SoloError> {
    if args.server == Some(ServerType::LlamaCpp) {
        println!("llama.cpp runs in the foreground; stop it with Ctrl-C.");
        return Ok(());
    }
    let docker = Docker::default();
    docker.ensure_running().await?;

    let mut stopped = 0;
    for name in targets(args.server) {
        if !docker.container_running(name).await? {
            continue;
        }
        println!("Stopping {name}...");
        docker.stop(name).await?;
        stopped += 1;
    }
    if stopped == 0 {
        println!("No running solo servers found.");
    } else {
        println!("{}", "Solo server stopped successfully.".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_targets() {
        assert_eq!(targets(Some(ServerType::Vllm)), ["solo-vllm"]);
        assert_eq!(targets(None), ["solo-ollama", "solo-vllm", "solo-lerobot"]);
        assert!(targets(Some(ServerType::LlamaCpp)).is_empty());
    }
}
