//! Hugging Face and Weights & Biases accounts.
//!
//! Logins are delegated to the vendors' own CLIs (`huggingface-cli`, `wandb`), which
//! store credentials where the robotics framework expects them. Repository metadata
//! is read from the public Hub API.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    internal::config::{ConfigError, ConfigStore, SessionConfig},
    utils::{
        operator::Operator,
        process::{ExternalCommand, ProcessError},
    },
};

pub const TOKEN_ENV: &str = "HUGGING_FACE_TOKEN";
const HUB_API: &str = "https://huggingface.co/api/models";

/// Account checks the robotics modes depend on.
#[async_trait]
pub trait Accounts: Send + Sync {
    /// The logged-in Hugging Face user, if any.
    async fn hf_whoami(&self) -> Option<String>;
    /// Interactive `huggingface-cli login`. Returns whether it succeeded.
    async fn hf_login(&self) -> bool;
    /// Interactive `wandb login`. Returns whether it succeeded.
    async fn wandb_login(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct CliAccounts;

#[async_trait]
impl Accounts for CliAccounts {
    async fn hf_whoami(&self) -> Option<String> {
        let output = ExternalCommand::new("huggingface-cli")
            .arg("whoami")
            .output()
            .await;
        match output {
            Ok(out) if out.success() => parse_whoami(&out.stdout),
            Ok(out) => {
                tracing::debug!(stderr = %out.stderr.trim(), "huggingface-cli whoami failed");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "huggingface-cli unavailable");
                None
            }
        }
    }

    async fn hf_login(&self) -> bool {
        run_login(ExternalCommand::new("huggingface-cli").arg("login")).await
    }

    async fn wandb_login(&self) -> bool {
        run_login(ExternalCommand::new("wandb").arg("login")).await
    }
}

async fn run_login(command: ExternalCommand) -> bool {
    match command.interactive().await {
        Ok(0) => true,
        Ok(code) => {
            println!("`{command}` exited with code {code}");
            false
        }
        Err(ProcessError::NotFound(program)) => {
            println!("`{program}` is not installed.");
            false
        }
        Err(e) => {
            println!("{e}");
            false
        }
    }
}

/// First line of `huggingface-cli whoami`, unless it says the user is not logged in.
pub fn parse_whoami(stdout: &str) -> Option<String> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    if first.to_ascii_lowercase().contains("not logged in") {
        None
    } else {
        Some(first.to_string())
    }
}

/// Token from `$HUGGING_FACE_TOKEN`, else the stored config.
pub fn resolve_token(config: &SessionConfig) -> Option<String> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
        _ => config.hf_token().map(str::to_string),
    }
}

/// Like [`resolve_token`], but asks the operator when no token is known and stores
/// the answer. An empty answer means "no token".
pub fn resolve_or_prompt_token(
    store: &dyn ConfigStore,
    config: &mut SessionConfig,
    operator: &mut dyn Operator,
) -> Result<Option<String>, ConfigError> {
    if let Some(token) = resolve_token(config) {
        return Ok(Some(token));
    }
    let answer = operator.ask(
        "Hugging Face token (leave empty to skip; gated models need one)",
        None,
    );
    let token = answer.trim();
    if token.is_empty() {
        return Ok(None);
    }
    config.hugging_face_mut().token = Some(token.to_string());
    store.save(config)?;
    Ok(Some(token.to_string()))
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// Files of a Hub model repo ending with one of `suffixes`.
pub async fn list_repo_files(
    repo_id: &str,
    suffixes: &[&str],
    token: Option<&str>,
) -> Result<Vec<String>, reqwest::Error> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let mut request = http.get(format!("{HUB_API}/{repo_id}"));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let info: ModelInfo = request.send().await?.error_for_status()?.json().await?;
    Ok(info
        .siblings
        .into_iter()
        .map(|s| s.rfilename)
        .filter(|f| suffixes.iter().any(|s| f.ends_with(s)))
        .collect())
}

/// `huggingface-cli download <repo> --local-dir <dir>`.
pub fn download_command(repo_id: &str, local_dir: &Path, token: Option<&str>) -> ExternalCommand {
    let mut command = ExternalCommand::new("huggingface-cli")
        .arg("download")
        .arg(repo_id)
        .arg("--local-dir")
        .arg(local_dir.to_string_lossy());
    if let Some(token) = token {
        command = command.arg("--token").arg(token);
    }
    command
}
