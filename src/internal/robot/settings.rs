//! Last-used settings of each robotics mode, stored under `lerobot.<mode>` so the
//! operator can rerun a mode without answering every prompt again.

use serde::{Deserialize, Serialize};

use crate::internal::robot::cameras::CameraSetup;

pub const TELEOP_FPS: u32 = 60;
pub const RECORD_FPS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleopSettings {
    pub fps: u32,
    #[serde(default)]
    pub cameras: CameraSetup,
}

impl Default for TeleopSettings {
    fn default() -> Self {
        Self {
            fps: TELEOP_FPS,
            cameras: CameraSetup::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub dataset_repo_id: String,
    pub task: String,
    pub episodes: u32,
    pub episode_time_s: u32,
    pub reset_time_s: u32,
    pub fps: u32,
    pub push_to_hub: bool,
    #[serde(default)]
    pub cameras: CameraSetup,
}

/// Policy architectures `lerobot-train` accepts for `--policy.type`.
pub const POLICY_TYPES: [&str; 6] = ["act", "diffusion", "pi0", "smolvla", "tdmpc", "vqbet"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub dataset_repo_id: String,
    pub policy_type: String,
    pub output_dir: String,
    pub steps: u32,
    pub batch_size: u32,
    /// `cuda`, `mps` or `cpu`.
    pub device: String,
    pub wandb: bool,
}

impl TrainingSettings {
    /// Where `lerobot-train` leaves the final checkpoint.
    pub fn last_checkpoint(&self) -> String {
        format!(
            "{}/checkpoints/last/pretrained_model",
            self.output_dir.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Hugging Face repo id or local checkpoint directory.
    pub policy_path: String,
    pub task: String,
    pub episode_time_s: u32,
    /// Dataset the evaluation episode is recorded into.
    pub eval_repo_id: String,
    #[serde(default)]
    pub cameras: CameraSetup,
}
