//! The `docker` CLI, as far as solo needs it.

use thiserror::Error;

use crate::utils::process::{CommandOutput, ExternalCommand, ProcessError};

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker is not installed")]
    NotInstalled,

    #[error("Docker is not running. Please start Docker and try again.")]
    NotRunning,

    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error(transparent)]
    Process(ProcessError),

    #[error("{0} did not become ready within {1} seconds")]
    Timeout(String, u64),

    #[error("port {0} is already in use")]
    PortInUse(u16),
}

impl From<ProcessError> for DockerError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound(_) => DockerError::NotInstalled,
            other => DockerError::Process(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Docker {
    program: String,
}

impl Default for Docker {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl Docker {
    fn command(&self) -> ExternalCommand {
        ExternalCommand::new(&self.program)
    }

    async fn checked(&self, command: ExternalCommand) -> Result<CommandOutput, DockerError> {
        let output = command.output().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(DockerError::Failed {
                command: command.to_string(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Whether the daemon answers `docker info`.
    pub async fn is_running(&self) -> Result<bool, DockerError> {
        let out = self.command().arg("info").output().await?;
        Ok(out.success())
    }

    pub async fn ensure_running(&self) -> Result<(), DockerError> {
        if self.is_running().await? {
            Ok(())
        } else {
            Err(DockerError::NotRunning)
        }
    }

    /// Ids of containers whose name matches `name` (a docker `name=` filter).
    pub async fn list_ids(&self, name: &str, include_stopped: bool) -> Result<Vec<String>, DockerError> {
        let flags = if include_stopped { "-aq" } else { "-q" };
        let out = self
            .checked(
                self.command()
                    .args(["ps", flags, "-f"])
                    .arg(format!("name={name}")),
            )
            .await?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn container_exists(&self, name: &str) -> Result<bool, DockerError> {
        Ok(!self.list_ids(name, true).await?.is_empty())
    }

    pub async fn container_running(&self, name: &str) -> Result<bool, DockerError> {
        Ok(!self.list_ids(name, false).await?.is_empty())
    }

    /// `name`, status and ports of every container matching `name`.
    pub async fn describe(&self, name: &str) -> Result<Vec<ContainerStatus>, DockerError> {
        let out = self
            .checked(
                self.command()
                    .args(["ps", "-a", "-f"])
                    .arg(format!("name={name}"))
                    .args(["--format", "{{.Names}}\t{{.Status}}\t{{.Ports}}"]),
            )
            .await?;
        Ok(out.stdout.lines().filter_map(ContainerStatus::parse).collect())
    }

    pub async fn start(&self, name: &str) -> Result<(), DockerError> {
        self.checked(self.command().arg("start").arg(name)).await.map(drop)
    }

    pub async fn stop(&self, name: &str) -> Result<(), DockerError> {
        self.checked(self.command().arg("stop").arg(name)).await.map(drop)
    }

    pub async fn remove(&self, name: &str, force: bool) -> Result<(), DockerError> {
        let mut command = self.command().arg("rm");
        if force {
            command = command.arg("-f");
        }
        self.checked(command.arg(name)).await.map(drop)
    }

    /// Pull with progress shown on the terminal.
    pub async fn pull(&self, image: &str) -> Result<(), DockerError> {
        let command = self.command().arg("pull").arg(image);
        match command.interactive().await? {
            0 => Ok(()),
            code => Err(DockerError::Failed {
                command: command.to_string(),
                stderr: format!("exit code {code}"),
            }),
        }
    }

    /// `docker run -d <args>`; returns the container id.
    pub async fn run_detached(&self, args: &[String]) -> Result<String, DockerError> {
        let out = self
            .checked(self.command().args(["run", "-d"]).args(args.iter().cloned()))
            .await?;
        Ok(out.stdout_trimmed().to_string())
    }

    /// Run a command inside a container; `Ok(false)` when it exits non-zero.
    pub async fn exec_ok(&self, name: &str, command: &[&str]) -> Result<bool, DockerError> {
        let out = self
            .command()
            .arg("exec")
            .arg(name)
            .args(command.iter().copied())
            .output()
            .await?;
        Ok(out.success())
    }

    /// `docker exec -it` attached to the terminal.
    pub async fn exec_interactive(&self, name: &str, command: &[&str]) -> Result<i32, DockerError> {
        Ok(self
            .command()
            .arg("exec")
            .arg("-it")
            .arg(name)
            .args(command.iter().copied())
            .interactive()
            .await?)
    }

    pub async fn logs(&self, name: &str, tail: usize) -> Result<CommandOutput, DockerError> {
        Ok(self
            .command()
            .args(["logs", "--tail"])
            .arg(tail.to_string())
            .arg(name)
            .output()
            .await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    pub status: String,
    pub ports: String,
}

impl ContainerStatus {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split('\t');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            status: parts.next().unwrap_or_default().trim().to_string(),
            ports: parts.next().unwrap_or_default().trim().to_string(),
        })
    }

    pub fn is_up(&self) -> bool {
        self.status.starts_with("Up")
    }
}
