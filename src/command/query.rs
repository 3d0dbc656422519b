use std::io::{self, BufRead, Write};

use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore, SessionConfig},
        server::{
            ServerType,
            client::{InferenceClient, QueryError, check_prompt},
        },
    },
};

#[derive(Parser, Debug, Default)]
pub struct QueryArgs {
    /// Prompt to send; starts an interactive session when omitted
    pub prompt: Option<String>,

    /// Server to query; defaults to the configured one, or LeRobot for an observation
    #[clap(short = 's', long = "server", value_enum)]
    pub server: Option<ServerType>,

    /// Port the server listens on
    #[clap(short = 'p', long)]
    pub port: Option<u16>,

    /// Model name sent with the request
    #[clap(short = 'm', long)]
    pub model: Option<String>,

    /// JSON observation for a LeRobot policy server
    #[clap(long, conflicts_with = "prompt")]
    pub observation: Option<String>,
}

/// Client for the server the arguments and config point at.
pub fn client_for(args: &QueryArgs, config: &SessionConfig) -> InferenceClient {
    let configured = config.server.as_ref();
    // Only a policy server answers observations.
    let server = match (args.server, &args.observation) {
        (Some(server), _) => server,
        (None, Some(_)) => ServerType::Lerobot,
        (None, None) => config.server_type().unwrap_or(ServerType::Ollama),
    };
    let same_server = config.server_type() == Some(server);
    let port = args
        .port
        .or_else(|| configured.and_then(|s| s.port).filter(|_| same_server))
        .unwrap_or(server.default_port());
    let model = args
        .model
        .clone()
        .or_else(|| configured.and_then(|s| s.model.clone()).filter(|_| same_server))
        .unwrap_or_else(|| server.default_model().to_string());
    InferenceClient::new(server, server.base_url(port), model)
}

pub async fn execute(args: QueryArgs) -> Result<(), SoloError> {
    let store = JsonFileStore::from_env()?;
    let client = client_for(&args, &store.load_or_default());

    if let Some(observation) = &args.observation {
        let observation: serde_json::Value = serde_json::from_str(observation)
            .map_err(|e| SoloError::InvalidArgument(format!("invalid observation JSON: {e}")))?;
        let action = client.predict(observation).await?;
        println!("{action}");
        return Ok(());
    }

    match &args.prompt {
        Some(prompt) => ask_once(&client, prompt).await,
        None => interactive(&client).await,
    }
}

async fn ask_once(client: &InferenceClient, prompt: &str) -> Result<(), SoloError> {
    if let Err(e) = check_prompt(prompt) {
        println!("{}", format!("Error: {e}").red());
        return Err(SoloError::Exit(1));
    }
    let answer = client.ask(prompt).await?;
    println!("{answer}");
    Ok(())
}

async fn interactive(client: &InferenceClient) -> Result<(), SoloError> {
    println!(
        "{}",
        "Interactive Mode (type 'exit' or 'quit' to end):".green().bold()
    );
    let stdin = io::stdin();
    loop {
        print!(">> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit") {
            return Ok(());
        }
        match client.ask(line).await {
            Ok(answer) => println!("{answer}"),
            Err(e @ QueryError::TooLong(_)) => println!("{}", format!("Error: {e}").red()),
            Err(e) => println!("{}", format!("Error querying server: {e}").yellow()),
        }
    }
}
