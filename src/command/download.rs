use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore},
        hub,
    },
    utils::{
        path,
        process::ProcessError,
    },
};

#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Model name or repo ID
    pub model_arg: Option<String>,

    /// Model name or repo ID (takes precedence over the positional form)
    #[clap(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Directory where models are downloaded
    #[clap(long = "download-dir")]
    pub download_dir: Option<PathBuf>,
}

impl DownloadArgs {
    pub fn repo_id(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or(self.model_arg.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

pub async fn execute(args: DownloadArgs) -> Result<(), SoloError> {
    let Some(repo_id) = args.repo_id() else {
        println!(
            "{}",
            "Please provide a model name (e.g., -m meta-llama/Llama-3.2-1B-Instruct)".red().bold()
        );
        return Err(SoloError::Exit(1));
    };

    let store = JsonFileStore::from_env()?;
    let token = hub::resolve_token(&store.load_or_default());
    let download_dir = args.download_dir.clone().unwrap_or_else(path::download_dir);
    let target = path::model_dir(&download_dir, repo_id);

    println!("Downloading model: {}...", repo_id.bold());
    match hub::download_command(repo_id, &target, token.as_deref()).interactive().await {
        Ok(0) => {
            println!(
                "{}",
                format!("Model downloaded successfully: {}", target.display()).green()
            );
            Ok(())
        }
        Ok(code) => {
            println!("{}", format!("Failed to download model (exit code {code})").red().bold());
            Err(SoloError::Exit(1))
        }
        Err(ProcessError::Interrupted(_)) => {
            println!("{}", "Download cancelled by user.".red().bold());
            Ok(())
        }
        Err(ProcessError::NotFound(program)) => {
            println!("{}", format!("`{program}` is not installed.").red());
            println!("Install it with `pip install -U \"huggingface_hub[cli]\"`.");
            Err(SoloError::Exit(1))
        }
        Err(e) => Err(e.into()),
    }
}
