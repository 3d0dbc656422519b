//! Thin wrapper over `tokio::process` for the external tools solo drives
//! (docker, lerobot entry points, huggingface-cli, nvidia-smi, pip).
//!
//! Two modes are supported:
//! - [`ExternalCommand::output`] captures stdout/stderr for parsing.
//! - [`ExternalCommand::interactive`] inherits the terminal so the child can prompt the
//!   operator directly, and turns a Ctrl-C into [`ProcessError::Interrupted`] instead of
//!   killing solo.
//!
//! Ctrl-C is owned by a single watcher ([`watch_interrupts`]) installed once at startup.
//! While an interactive child runs, the interrupt is left to the child and recorded; at
//! any other time (an operator prompt, a spinner) solo exits with [`SIGINT_EXIT_CODE`].

use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use thiserror::Error;
use tokio::process::Command;

/// Conventional exit code of a process terminated by SIGINT.
pub const SIGINT_EXIT_CODE: i32 = 130;

/// Interactive children currently attached to the terminal.
static FOREGROUND_CHILDREN: AtomicUsize = AtomicUsize::new(0);
/// Set when a Ctrl-C arrives while a foreground child runs.
static CHILD_INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// What the Ctrl-C watcher should do with an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Nothing else will observe the interrupt; abort solo.
    Exit,
    /// A foreground child received it too; its caller reports the interruption.
    Forwarded,
}

/// Record one Ctrl-C and decide who handles it.
pub fn handle_interrupt() -> InterruptAction {
    if FOREGROUND_CHILDREN.load(Ordering::SeqCst) == 0 {
        InterruptAction::Exit
    } else {
        CHILD_INTERRUPTED.store(true, Ordering::SeqCst);
        InterruptAction::Forwarded
    }
}

/// Install the process-wide Ctrl-C watcher. Call once, at startup.
///
/// Once a tokio signal listener exists the default SIGINT disposition is gone for good,
/// so every later Ctrl-C must be routed through here. The watcher owns a thread, so a
/// worker blocked on an operator prompt cannot starve it.
pub fn watch_interrupts() {
    let spawned = std::thread::Builder::new()
        .name("solo-interrupts".to_string())
        .spawn(|| {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot watch for Ctrl-C");
                    return;
                }
            };
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if handle_interrupt() == InterruptAction::Exit {
                        tracing::debug!("interrupted outside a child process, exiting");
                        println!();
                        std::process::exit(SIGINT_EXIT_CODE);
                    }
                }
            });
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "cannot watch for Ctrl-C");
    }
}

/// Marks an interactive child as attached to the terminal for its lifetime.
struct ForegroundChild;

impl ForegroundChild {
    fn attach() -> Self {
        if FOREGROUND_CHILDREN.fetch_add(1, Ordering::SeqCst) == 0 {
            CHILD_INTERRUPTED.store(false, Ordering::SeqCst);
        }
        ForegroundChild
    }

    fn interrupted(&self) -> bool {
        CHILD_INTERRUPTED.swap(false, Ordering::SeqCst)
    }
}

impl Drop for ForegroundChild {
    fn drop(&mut self) {
        FOREGROUND_CHILDREN.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{0}` was not found on PATH")]
    NotFound(String),

    #[error("failed to run `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` was interrupted")]
    Interrupted(String),
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Run to completion and capture both output streams.
    pub async fn output(&self) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(command = %self, "running captured command");
        let output = self
            .build()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run attached to the terminal and return the exit code.
    ///
    /// The child shares solo's process group, so a Ctrl-C reaches it as well; solo
    /// waits for it to exit and reports [`ProcessError::Interrupted`].
    pub async fn interactive(&self) -> Result<i32, ProcessError> {
        tracing::debug!(command = %self, "running interactive command");
        let guard = ForegroundChild::attach();
        let mut child = self
            .build()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = child.wait().await.map_err(|e| self.spawn_error(e))?;
        let interrupted = guard.interrupted();
        drop(guard);
        match status.code() {
            Some(SIGINT_EXIT_CODE) | None => Err(ProcessError::Interrupted(self.program.clone())),
            Some(_) if interrupted => Err(ProcessError::Interrupted(self.program.clone())),
            Some(code) => Ok(code),
        }
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ProcessError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound(self.program.clone())
        } else {
            ProcessError::Io {
                program: self.program.clone(),
                source: e,
            }
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Whether `program` resolves to an executable on PATH.
pub fn on_path(program: impl AsRef<OsStr>) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_display_quotes_whitespace_args() {
        let cmd = ExternalCommand::new("lerobot-record")
            .arg("--dataset.single_task=Pick up the cube")
            .arg("--fps=30");
        assert_eq!(
            cmd.to_string(),
            "lerobot-record '--dataset.single_task=Pick up the cube' --fps=30"
        );
    }

    #[tokio::test]
    async fn test_missing_program_maps_to_not_found() {
        let err = ExternalCommand::new("solo-definitely-not-a-real-binary")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(p) if p == "solo-definitely-not-a-real-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_captures_stdout_and_code() {
        let out = ExternalCommand::new("sh")
            .args(["-c", "echo hello; exit 3"])
            .output()
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout_trimmed(), "hello");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_is_passed_to_child() {
        let out = ExternalCommand::new("sh")
            .args(["-c", "printf %s \"$SOLO_TEST_VAR\""])
            .env("SOLO_TEST_VAR", "ok")
            .output()
            .await
            .unwrap();
        assert_eq!(out.stdout, "ok");
    }

    #[test]
    #[serial]
    fn test_interrupt_without_child_exits() {
        assert_eq!(handle_interrupt(), InterruptAction::Exit);
    }

    #[test]
    #[serial]
    fn test_interrupt_is_forwarded_only_while_child_attached() {
        let guard = ForegroundChild::attach();
        assert_eq!(handle_interrupt(), InterruptAction::Forwarded);
        assert!(guard.interrupted());
        assert!(!guard.interrupted());
        drop(guard);
        assert_eq!(handle_interrupt(), InterruptAction::Exit);
    }

    /// A finished interactive command must not keep swallowing Ctrl-C at later prompts
    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn test_interrupt_exits_after_interactive_command() {
        let code = ExternalCommand::new("true").interactive().await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(handle_interrupt(), InterruptAction::Exit);
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn test_interrupt_during_child_reports_interrupted() {
        let cmd = ExternalCommand::new("sh").args(["-c", "sleep 0.2"]);
        let run = tokio::spawn(async move { cmd.interactive().await });
        while FOREGROUND_CHILDREN.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle_interrupt(), InterruptAction::Forwarded);
        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, ProcessError::Interrupted(p) if p == "sh"));
        assert_eq!(handle_interrupt(), InterruptAction::Exit);
    }
}
