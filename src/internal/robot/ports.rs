//! Find the serial port of an arm by diffing port snapshots around a plug or unplug.
//!
//! [`PortDetection`] is the decision logic and never touches hardware: it is fed
//! snapshots and operator choices and answers with the next [`DetectStep`].
//! [`detect_arm_port`] drives it with a real [`PortScanner`] and [`Operator`].

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use colored::Colorize;

use crate::utils::operator::Operator;

/// Time for the OS to enumerate or drop a device after a physical plug event.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

pub trait PortScanner: Send + Sync {
    fn available_ports(&self) -> Vec<String>;
}

/// Serial ports of this machine: `serialport` enumeration on Windows, every
/// `/dev/tty*` node elsewhere.
#[derive(Debug, Clone)]
pub struct SystemPortScanner {
    #[cfg_attr(windows, allow(dead_code))]
    dev_dir: PathBuf,
}

impl Default for SystemPortScanner {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
        }
    }
}

impl SystemPortScanner {
    pub fn with_dev_dir(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }
}

impl PortScanner for SystemPortScanner {
    #[cfg(windows)]
    fn available_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate serial ports");
                Vec::new()
            }
        }
    }

    #[cfg(not(windows))]
    fn available_ports(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dev_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dev_dir.display(), error = %e, "failed to list serial ports");
                return Vec::new();
            }
        };
        let mut ports: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("tty"))
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        ports.sort();
        ports
    }
}

/// Physical action the operator is asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortPrompt {
    Connect,
    Unplug,
    Replug(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceReason {
    SeveralAppeared,
    SeveralDisappeared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(String),
    /// Nothing appeared and there was nothing to unplug.
    NoPorts,
    /// Nothing appeared, and nothing disappeared on unplug either.
    NothingDisappeared,
    /// The machine was fed input it was not waiting for.
    Aborted,
}

impl Outcome {
    pub fn port(self) -> Option<String> {
        match self {
            Outcome::Found(port) => Some(port),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectStep {
    Prompt(PortPrompt),
    Choose {
        reason: ChoiceReason,
        candidates: Vec<String>,
    },
    Done(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectInput {
    Snapshot(Vec<String>),
    Chosen(usize),
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    AwaitingConnect,
    AwaitingUnplug,
    AwaitingChoice {
        candidates: Vec<String>,
        replug: bool,
    },
    AwaitingReplug(String),
    Finished,
}

#[derive(Debug, Clone)]
pub struct PortDetection {
    before: BTreeSet<String>,
    state: State,
}

impl PortDetection {
    /// Begin with the ports present before the arm was connected.
    pub fn start(before: Vec<String>) -> (Self, DetectStep) {
        let detection = Self {
            before: before.into_iter().collect(),
            state: State::AwaitingConnect,
        };
        (detection, DetectStep::Prompt(PortPrompt::Connect))
    }

    pub fn advance(&mut self, input: DetectInput) -> DetectStep {
        let state = std::mem::replace(&mut self.state, State::Finished);
        match (state, input) {
            (State::AwaitingConnect, DetectInput::Snapshot(after)) => {
                let after: BTreeSet<String> = after.into_iter().collect();
                let appeared: Vec<String> = after.difference(&self.before).cloned().collect();
                match appeared.len() {
                    1 => self.finish(Outcome::Found(appeared[0].clone())),
                    0 if self.before.is_empty() => self.finish(Outcome::NoPorts),
                    0 => {
                        self.state = State::AwaitingUnplug;
                        DetectStep::Prompt(PortPrompt::Unplug)
                    }
                    _ => self.ask_choice(appeared, ChoiceReason::SeveralAppeared, false),
                }
            }
            (State::AwaitingUnplug, DetectInput::Snapshot(unplugged)) => {
                let unplugged: BTreeSet<String> = unplugged.into_iter().collect();
                let missing: Vec<String> = self.before.difference(&unplugged).cloned().collect();
                match missing.len() {
                    0 => self.finish(Outcome::NothingDisappeared),
                    1 => self.ask_replug(missing[0].clone()),
                    _ => self.ask_choice(missing, ChoiceReason::SeveralDisappeared, true),
                }
            }
            (State::AwaitingChoice { candidates, replug }, DetectInput::Chosen(index)) => {
                let index = if index < candidates.len() { index } else { 0 };
                let port = candidates[index].clone();
                if replug {
                    self.ask_replug(port)
                } else {
                    self.finish(Outcome::Found(port))
                }
            }
            (State::AwaitingReplug(port), DetectInput::Acknowledged) => {
                self.finish(Outcome::Found(port))
            }
            (state, input) => {
                tracing::debug!(?state, ?input, "unexpected port detection input");
                self.finish(Outcome::Aborted)
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> DetectStep {
        self.state = State::Finished;
        DetectStep::Done(outcome)
    }

    fn ask_replug(&mut self, port: String) -> DetectStep {
        self.state = State::AwaitingReplug(port.clone());
        DetectStep::Prompt(PortPrompt::Replug(port))
    }

    fn ask_choice(&mut self, candidates: Vec<String>, reason: ChoiceReason, replug: bool) -> DetectStep {
        self.state = State::AwaitingChoice {
            candidates: candidates.clone(),
            replug,
        };
        DetectStep::Choose { reason, candidates }
    }
}

/// Walk the operator through plugging in `arm_label` and return its port, or `None`
/// when it could not be identified.
pub async fn detect_arm_port(
    arm_label: &str,
    scanner: &dyn PortScanner,
    operator: &mut dyn Operator,
    settle: Duration,
) -> Option<String> {
    println!("\n{}", format!("Detecting port for {arm_label} arm...").bold());
    let before = scanner.available_ports();
    tracing::debug!(arm = arm_label, ports = ?before, "ports before connect");

    let (mut detection, mut step) = PortDetection::start(before);
    loop {
        step = match step {
            DetectStep::Prompt(PortPrompt::Connect) => {
                operator.pause(&format!(
                    "Connect the {arm_label} arm via USB and press Enter when ready."
                ));
                tokio::time::sleep(settle).await;
                detection.advance(DetectInput::Snapshot(scanner.available_ports()))
            }
            DetectStep::Prompt(PortPrompt::Unplug) => {
                println!(
                    "{}",
                    "No new port appeared. The arm may already have been connected.".yellow()
                );
                operator.pause(&format!(
                    "Unplug the {arm_label} arm's USB cable and press Enter."
                ));
                tokio::time::sleep(settle).await;
                detection.advance(DetectInput::Snapshot(scanner.available_ports()))
            }
            DetectStep::Prompt(PortPrompt::Replug(port)) => {
                println!("Identified {arm_label} arm port: {port}");
                operator.pause(&format!(
                    "Plug the {arm_label} arm back in and press Enter."
                ));
                tokio::time::sleep(settle).await;
                detection.advance(DetectInput::Acknowledged)
            }
            DetectStep::Choose { reason, candidates } => {
                let what = match reason {
                    ChoiceReason::SeveralAppeared => "appeared",
                    ChoiceReason::SeveralDisappeared => "disappeared",
                };
                println!("Several ports {what}:");
                let index = operator.choose(
                    &format!("Which one is the {arm_label} arm?"),
                    &candidates,
                    0,
                );
                detection.advance(DetectInput::Chosen(index))
            }
            DetectStep::Done(outcome) => {
                match &outcome {
                    Outcome::Found(port) => {
                        println!("{}", format!("{arm_label} arm detected on {port}").green())
                    }
                    Outcome::NoPorts => println!(
                        "{}",
                        format!("No serial ports found. Check the {arm_label} arm's USB connection.").red()
                    ),
                    Outcome::NothingDisappeared => println!(
                        "{}",
                        format!("No port disappeared; could not identify the {arm_label} arm.").red()
                    ),
                    Outcome::Aborted => println!(
                        "{}",
                        format!("Port detection for the {arm_label} arm was aborted.").red()
                    ),
                }
                return outcome.port();
            }
        };
    }
}
