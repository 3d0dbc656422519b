//! CLI entry for solo, defining clap subcommands and dispatching each command handler.

use clap::{Parser, Subcommand};

use crate::{command, error::SoloError};

// The Cli struct represents the root of the command line interface.
#[derive(Parser, Debug)]
#[command(
    name = "solo",
    about = "Solo: local model servers and leader/follower robot arms",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands; each one's args and `execute` live in the `command` module.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Detect hardware and choose a server")]
    Setup(command::setup::SetupArgs),
    #[command(about = "Start the configured model server")]
    Serve(command::serve::ServeArgs),
    #[command(about = "Show the configured server and solo containers")]
    Status(command::status::StatusArgs),
    #[command(about = "Stop solo servers")]
    Stop(command::stop::StopArgs),
    #[command(about = "Remove solo containers, downloaded models and saved settings")]
    Reset(command::reset::ResetArgs),
    #[command(about = "List downloaded models")]
    List(command::list::ListArgs),
    #[command(about = "Download a model from the Hugging Face Hub")]
    Download(command::download::DownloadArgs),
    #[command(about = "Send a prompt or observation to the running server")]
    Query(command::query::QueryArgs),
    #[command(
        about = "Robot arms: motor setup, calibration, teleoperation, recording, training and inference"
    )]
    Robo(command::robo::RoboArgs),
    #[command(subcommand, about = "Model Context Protocol servers")]
    Mcp(command::mcp::McpCmds),
}

/// Parse the command line and run the selected command.
/// - Caution: This is a `synchronous` function, it's declared as `async` to be able to use `[tokio::main]`
/// - `args`: parse from command line if it's `None`, otherwise parse from the given args
#[tokio::main]
pub async fn parse(args: Option<&[&str]>) -> Result<(), SoloError> {
    crate::utils::process::watch_interrupts();
    parse_async(args).await
}

/// `async` version of the [parse] function
pub async fn parse_async(args: Option<&[&str]>) -> Result<(), SoloError> {
    let args = match args {
        Some(args) => {
            Cli::try_parse_from(args).map_err(|e| SoloError::InvalidArgument(e.to_string()))?
        }
        None => Cli::parse(),
    };
    match args.command {
        Commands::Setup(args) => command::setup::execute(args).await,
        Commands::Serve(args) => command::serve::execute(args).await,
        Commands::Status(args) => command::status::execute(args).await,
        Commands::Stop(args) => command::stop::execute(args).await,
        Commands::Reset(args) => command::reset::execute(args).await,
        Commands::List(args) => command::list::execute(args).await,
        Commands::Download(args) => command::download::execute(args).await,
        Commands::Query(args) => command::query::execute(args).await,
        Commands::Robo(args) => command::robo::execute(args).await,
        Commands::Mcp(cmd) => command::mcp::execute(cmd).await,
    }
}

/// this test is to verify that the CLI can be built without panicking
/// according [clap dock](https://docs.rs/clap/latest/clap/_derive/_tutorial/chapter_4/index.html)
#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}

#[tokio::test]
async fn test_invalid_robo_type_is_an_argument_error() {
    let err = parse_async(Some(&["solo", "robo", "--type", "groot"][..]))
        .await
        .unwrap_err();
    assert!(matches!(err, SoloError::InvalidArgument(_)));
}
