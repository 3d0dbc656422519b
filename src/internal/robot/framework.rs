//! Seam between solo's workflows and the external robotics framework.
//!
//! [`RobotFramework`] is what the calibration and mode handlers talk to;
//! [`LerobotCli`] implements it by running the `lerobot-*` console scripts that a
//! `pip install lerobot` puts on PATH, passing configuration as `--section.key=value`
//! arguments.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    internal::robot::{
        cameras::CameraSetup,
        settings::{InferenceSettings, RecordingSettings, TrainingSettings},
    },
    utils::process::{self, ExternalCommand, ProcessError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotKind {
    #[default]
    So100,
    So101,
}

impl RobotKind {
    pub const ALL: [RobotKind; 2] = [RobotKind::So100, RobotKind::So101];

    pub fn as_str(&self) -> &'static str {
        match self {
            RobotKind::So100 => "so100",
            RobotKind::So101 => "so101",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RobotKind::So100 => "SO100",
            RobotKind::So101 => "SO101",
        }
    }

    /// Leader and follower device configs of this kind.
    pub fn device_pair(self, leader_port: &str, follower_port: &str) -> (DeviceConfig, DeviceConfig) {
        (
            DeviceConfig::new(self, ArmRole::Leader, leader_port),
            DeviceConfig::new(self, ArmRole::Follower, follower_port),
        )
    }
}

impl fmt::Display for RobotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "so100" => Ok(RobotKind::So100),
            "so101" => Ok(RobotKind::So101),
            other => Err(format!("unsupported robot type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmRole {
    Leader,
    Follower,
}

impl ArmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmRole::Leader => "leader",
            ArmRole::Follower => "follower",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ArmRole::Leader => "Leader",
            ArmRole::Follower => "Follower",
        }
    }

    /// LeRobot names the hand-driven arm a teleoperator and the driven arm a robot.
    fn section(&self) -> &'static str {
        match self {
            ArmRole::Leader => "teleop",
            ArmRole::Follower => "robot",
        }
    }
}

impl fmt::Display for ArmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One arm as the framework sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub kind: RobotKind,
    pub role: ArmRole,
    pub port: String,
    /// Calibration files are keyed by this id, so it must be stable across runs.
    pub id: String,
}

impl DeviceConfig {
    pub fn new(kind: RobotKind, role: ArmRole, port: impl Into<String>) -> Self {
        Self {
            kind,
            role,
            port: port.into(),
            id: format!("{kind}_{role}"),
        }
    }

    /// e.g. `so101_follower`.
    pub fn device_type(&self) -> String {
        format!("{}_{}", self.kind, self.role)
    }

    fn args(&self) -> Vec<String> {
        let section = self.role.section();
        vec![
            format!("--{section}.type={}", self.device_type()),
            format!("--{section}.port={}", self.port),
            format!("--{section}.id={}", self.id),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeleopRequest {
    pub leader: DeviceConfig,
    pub follower: DeviceConfig,
    pub cameras: CameraSetup,
    pub fps: u32,
    pub display_data: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRequest {
    pub leader: DeviceConfig,
    pub follower: DeviceConfig,
    pub settings: RecordingSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainRequest {
    pub settings: TrainingSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub follower: DeviceConfig,
    pub settings: InferenceSettings,
}

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("LeRobot is not installed (missing `{0}`)")]
    NotInstalled(String),

    #[error("{step} failed with exit code {code}")]
    Failed { step: &'static str, code: i32 },

    #[error("{0} interrupted by user")]
    Interrupted(&'static str),

    #[error(transparent)]
    Process(ProcessError),
}

#[async_trait]
pub trait RobotFramework: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn calibrate(&self, device: &DeviceConfig) -> Result<(), FrameworkError>;
    async fn setup_motors(&self, device: &DeviceConfig) -> Result<(), FrameworkError>;
    async fn teleoperate(&self, request: &TeleopRequest) -> Result<(), FrameworkError>;
    async fn record(&self, request: &RecordRequest) -> Result<(), FrameworkError>;
    async fn train(&self, request: &TrainRequest) -> Result<(), FrameworkError>;
    async fn infer(&self, request: &InferenceRequest) -> Result<(), FrameworkError>;
}

const CALIBRATE_BIN: &str = "lerobot-calibrate";
const SETUP_MOTORS_BIN: &str = "lerobot-setup-motors";
const TELEOPERATE_BIN: &str = "lerobot-teleoperate";
const RECORD_BIN: &str = "lerobot-record";
const TRAIN_BIN: &str = "lerobot-train";

pub const INSTALL_HINT: &str = "pip install 'lerobot[feetech]'";

/// Drives LeRobot through its console scripts.
#[derive(Debug, Clone, Default)]
pub struct LerobotCli;

impl LerobotCli {
    pub fn calibrate_command(device: &DeviceConfig) -> ExternalCommand {
        ExternalCommand::new(CALIBRATE_BIN).args(device.args())
    }

    pub fn setup_motors_command(device: &DeviceConfig) -> ExternalCommand {
        let section = device.role.section();
        ExternalCommand::new(SETUP_MOTORS_BIN)
            .arg(format!("--{section}.type={}", device.device_type()))
            .arg(format!("--{section}.port={}", device.port))
    }

    pub fn teleoperate_command(request: &TeleopRequest) -> ExternalCommand {
        ExternalCommand::new(TELEOPERATE_BIN)
            .args(request.follower.args())
            .args(cameras_arg(&request.cameras))
            .args(request.leader.args())
            .arg(format!("--fps={}", request.fps))
            .arg(format!("--display_data={}", request.display_data))
    }

    pub fn record_command(request: &RecordRequest) -> ExternalCommand {
        let s = &request.settings;
        ExternalCommand::new(RECORD_BIN)
            .args(request.follower.args())
            .args(cameras_arg(&s.cameras))
            .args(request.leader.args())
            .arg(format!("--dataset.repo_id={}", s.dataset_repo_id))
            .arg(format!("--dataset.single_task={}", s.task))
            .arg(format!("--dataset.num_episodes={}", s.episodes))
            .arg(format!("--dataset.episode_time_s={}", s.episode_time_s))
            .arg(format!("--dataset.reset_time_s={}", s.reset_time_s))
            .arg(format!("--dataset.fps={}", s.fps))
            .arg(format!("--dataset.push_to_hub={}", s.push_to_hub))
            .arg("--display_data=true")
    }

    pub fn train_command(request: &TrainRequest) -> ExternalCommand {
        let s = &request.settings;
        let job_name = s
            .output_dir
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(s.policy_type.as_str())
            .to_string();
        ExternalCommand::new(TRAIN_BIN)
            .arg(format!("--dataset.repo_id={}", s.dataset_repo_id))
            .arg(format!("--policy.type={}", s.policy_type))
            .arg(format!("--policy.device={}", s.device))
            .arg("--policy.push_to_hub=false")
            .arg(format!("--output_dir={}", s.output_dir))
            .arg(format!("--job_name={job_name}"))
            .arg(format!("--steps={}", s.steps))
            .arg(format!("--batch_size={}", s.batch_size))
            .arg(format!("--wandb.enable={}", s.wandb))
    }

    /// Inference is a recording session whose actions come from a policy.
    pub fn infer_command(request: &InferenceRequest) -> ExternalCommand {
        let s = &request.settings;
        ExternalCommand::new(RECORD_BIN)
            .args(request.follower.args())
            .args(cameras_arg(&s.cameras))
            .arg(format!("--policy.path={}", s.policy_path))
            .arg(format!("--dataset.repo_id={}", s.eval_repo_id))
            .arg(format!("--dataset.single_task={}", s.task))
            .arg("--dataset.num_episodes=1")
            .arg(format!("--dataset.episode_time_s={}", s.episode_time_s))
            .arg("--dataset.push_to_hub=false")
            .arg("--display_data=true")
    }

    async fn run(step: &'static str, command: ExternalCommand) -> Result<(), FrameworkError> {
        tracing::info!(step, command = %command, "invoking lerobot");
        match command.interactive().await {
            Ok(0) => Ok(()),
            Ok(code) => Err(FrameworkError::Failed { step, code }),
            Err(ProcessError::Interrupted(_)) => Err(FrameworkError::Interrupted(step)),
            Err(ProcessError::NotFound(program)) => Err(FrameworkError::NotInstalled(program)),
            Err(e) => Err(FrameworkError::Process(e)),
        }
    }
}

fn cameras_arg(cameras: &CameraSetup) -> Option<String> {
    cameras
        .to_framework_arg()
        .map(|json| format!("--robot.cameras={json}"))
}

#[async_trait]
impl RobotFramework for LerobotCli {
    async fn is_available(&self) -> bool {
        process::on_path(CALIBRATE_BIN)
    }

    async fn calibrate(&self, device: &DeviceConfig) -> Result<(), FrameworkError> {
        Self::run("calibration", Self::calibrate_command(device)).await
    }

    async fn setup_motors(&self, device: &DeviceConfig) -> Result<(), FrameworkError> {
        Self::run("motor setup", Self::setup_motors_command(device)).await
    }

    async fn teleoperate(&self, request: &TeleopRequest) -> Result<(), FrameworkError> {
        Self::run("teleoperation", Self::teleoperate_command(request)).await
    }

    async fn record(&self, request: &RecordRequest) -> Result<(), FrameworkError> {
        Self::run("recording", Self::record_command(request)).await
    }

    async fn train(&self, request: &TrainRequest) -> Result<(), FrameworkError> {
        Self::run("training", Self::train_command(request)).await
    }

    async fn infer(&self, request: &InferenceRequest) -> Result<(), FrameworkError> {
        Self::run("inference", Self::infer_command(request)).await
    }
}
