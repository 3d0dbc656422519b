//! Session config persisted at `~/.solo_server/config.json`.
//!
//! The file is shared between runs of every command: hardware detection results,
//! the active server, Hugging Face credentials and the robot-arm setup all live here.
//! Sections solo does not know about are kept verbatim, so a newer or older solo can
//! share the file.
//!
//! Writes go through a temp file in the same directory followed by a rename, so an
//! interrupted save never leaves a truncated file behind.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    internal::{
        hardware::SystemInfo,
        robot::{
            cameras::CameraSetup,
            framework::{ArmRole, RobotKind},
            settings::{InferenceSettings, RecordingSettings, TeleopSettings, TrainingSettings},
        },
        server::ServerType,
    },
    utils::path,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a home directory for the solo config")]
    NoHomeDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lerobot: Option<LerobotSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugging_face: Option<HuggingFaceSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_info: Option<SystemInfo>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionConfig {
    pub fn lerobot_mut(&mut self) -> &mut LerobotSection {
        self.lerobot.get_or_insert_with(LerobotSection::default)
    }

    pub fn server_mut(&mut self) -> &mut ServerSection {
        self.server.get_or_insert_with(ServerSection::default)
    }

    pub fn hugging_face_mut(&mut self) -> &mut HuggingFaceSection {
        self.hugging_face
            .get_or_insert_with(HuggingFaceSection::default)
    }

    /// The configured server, if `server.type` names one solo knows.
    pub fn server_type(&self) -> Option<ServerType> {
        self.server
            .as_ref()
            .and_then(|s| s.server_type.as_deref())
            .and_then(|name| name.parse().ok())
    }

    /// The stored Hugging Face token, ignoring empty strings.
    pub fn hf_token(&self) -> Option<&str> {
        self.hugging_face
            .as_ref()
            .and_then(|hf| hf.token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Robot-arm state written by the calibration workflow and read by every other mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LerobotSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_type: Option<RobotKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_calibrated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_calibrated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_motors_setup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_motors_setup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cameras: Option<CameraSetup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleop: Option<TeleopSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording: Option<RecordingSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<InferenceSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ports of a calibrated leader/follower pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibratedArms {
    pub kind: RobotKind,
    pub leader_port: String,
    pub follower_port: String,
}

impl LerobotSection {
    pub fn is_calibrated(&self, role: ArmRole) -> bool {
        match role {
            ArmRole::Leader => self.leader_calibrated.unwrap_or(false),
            ArmRole::Follower => self.follower_calibrated.unwrap_or(false),
        }
    }

    pub fn port(&self, role: ArmRole) -> Option<&str> {
        match role {
            ArmRole::Leader => self.leader_port.as_deref(),
            ArmRole::Follower => self.follower_port.as_deref(),
        }
    }

    /// Both arms known and calibrated. Operation modes refuse to start otherwise.
    pub fn calibrated_arms(&self) -> Option<CalibratedArms> {
        if !(self.is_calibrated(ArmRole::Leader) && self.is_calibrated(ArmRole::Follower)) {
            return None;
        }
        Some(CalibratedArms {
            kind: self.robot_type.unwrap_or_default(),
            leader_port: self.leader_port.clone()?,
            follower_port: self.follower_port.clone()?,
        })
    }

    /// Merge the outcome of a setup run. Fields the run did not produce are left alone,
    /// calibration flags are always overwritten.
    pub fn apply(&mut self, arm: &ArmSetup) {
        if let Some(kind) = arm.robot_type {
            self.robot_type = Some(kind);
        }
        if let Some(port) = &arm.leader_port {
            self.leader_port = Some(port.clone());
        }
        if let Some(port) = &arm.follower_port {
            self.follower_port = Some(port.clone());
        }
        if let Some(ok) = arm.leader_motors_setup {
            self.leader_motors_setup = Some(ok);
        }
        if let Some(ok) = arm.follower_motors_setup {
            self.follower_motors_setup = Some(ok);
        }
        if let Some(cameras) = &arm.cameras {
            self.cameras = Some(cameras.clone());
        }
        self.leader_calibrated = Some(arm.leader_calibrated);
        self.follower_calibrated = Some(arm.follower_calibrated);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Kept as a string so an unknown server name written by another version does not
    /// make the whole file unreadable.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HuggingFaceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of one calibration or full-setup run.
///
/// The two calibration flags are always serialised, even when false, so a partial run
/// can be told apart from a run that never happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_type: Option<RobotKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_motors_setup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_motors_setup: Option<bool>,
    #[serde(default)]
    pub leader_calibrated: bool,
    #[serde(default)]
    pub follower_calibrated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cameras: Option<CameraSetup>,
}

impl ArmSetup {
    pub fn new(kind: RobotKind) -> Self {
        Self {
            robot_type: Some(kind),
            ..Default::default()
        }
    }

    pub fn set_port(&mut self, role: ArmRole, port: String) {
        match role {
            ArmRole::Leader => self.leader_port = Some(port),
            ArmRole::Follower => self.follower_port = Some(port),
        }
    }

    pub fn set_motors_setup(&mut self, role: ArmRole, ok: bool) {
        match role {
            ArmRole::Leader => self.leader_motors_setup = Some(ok),
            ArmRole::Follower => self.follower_motors_setup = Some(ok),
        }
    }

    pub fn set_calibrated(&mut self, role: ArmRole, ok: bool) {
        match role {
            ArmRole::Leader => self.leader_calibrated = ok,
            ArmRole::Follower => self.follower_calibrated = ok,
        }
    }

    /// `None` when motor setup was not requested, otherwise whether every attempted
    /// arm succeeded.
    pub fn motors_ok(&self) -> Option<bool> {
        match (self.leader_motors_setup, self.follower_motors_setup) {
            (None, None) => None,
            (leader, follower) => Some(leader.unwrap_or(false) && follower.unwrap_or(false)),
        }
    }
}

/// Verdict printed at the end of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationReport {
    /// Both arms calibrated. `motors` is `Some` when motor setup was part of the run.
    Success { motors: Option<bool> },
    Partial,
}

impl CalibrationReport {
    pub fn is_success(&self) -> bool {
        matches!(self, CalibrationReport::Success { .. })
    }

    pub fn print(&self) {
        match self {
            CalibrationReport::Success { motors } => {
                println!("{}", "Arms calibrated successfully!".green().bold());
                match motors {
                    Some(true) => println!("Motor IDs have been set up for both arms."),
                    Some(false) => println!(
                        "{}",
                        "Some motor setups may have failed, but calibration completed.".yellow()
                    ),
                    None => {}
                }
                println!("You can now run teleoperation: solo robo --type lerobot --teleop");
            }
            CalibrationReport::Partial => {
                println!("{}", "Calibration partially completed.".yellow().bold());
                println!(
                    "You can run 'solo robo --type lerobot --calibrate' again to retry the failed arms."
                );
            }
        }
    }
}

/// Judge a finished run from the arm setup alone: both ports known and both arms
/// calibrated. The stored config is not consulted,
/// so stale flags from an earlier run cannot turn a failed run into a success.
pub fn check_calibration_success(arm: &ArmSetup, setup_motors: bool) -> CalibrationReport {
    let ports_known = arm.leader_port.is_some() && arm.follower_port.is_some();
    if ports_known && arm.leader_calibrated && arm.follower_calibrated {
        let motors = if setup_motors { arm.motors_ok() } else { None };
        CalibrationReport::Success { motors }
    } else {
        CalibrationReport::Partial
    }
}

/// Persistence for [`SessionConfig`].
pub trait ConfigStore {
    fn path(&self) -> &Path;

    /// A missing file is an empty config. A file that exists but does not parse is an error.
    fn load(&self) -> Result<SessionConfig, ConfigError>;

    fn save(&self, config: &SessionConfig) -> Result<(), ConfigError>;

    /// Remove all stored state. Files solo did not write are left in place.
    fn reset(&self) -> Result<(), ConfigError>;

    /// Like [`ConfigStore::load`], but a malformed file is reported and treated as empty.
    fn load_or_default(&self) -> SessionConfig {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %self.path().display(), error = %e, "ignoring unreadable config");
                eprintln!(
                    "{}",
                    format!("warning: {e}; starting from an empty config").yellow()
                );
                SessionConfig::default()
            }
        }
    }
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location, see [`path::config_file`].
    pub fn from_env() -> Result<Self, ConfigError> {
        path::config_file()
            .map(Self::new)
            .ok_or(ConfigError::NoHomeDir)
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for JsonFileStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SessionConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionConfig::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(SessionConfig::default());
        }
        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, config: &SessionConfig) -> Result<(), ConfigError> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let json = to_pretty_json(config)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    fn reset(&self) -> Result<(), ConfigError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }
        // The directory goes only once nothing else lives in it.
        match fs::remove_dir(self.dir()) {
            Ok(()) => tracing::debug!(dir = %self.dir().display(), "config directory removed"),
            Err(e) => tracing::debug!(dir = %self.dir().display(), error = %e, "config directory kept"),
        }
        Ok(())
    }
}

/// Four-space indented JSON.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Merge a setup run into `config`, mark the active server as LeRobot and persist.
/// Saving the same run twice leaves the file unchanged.
pub fn save_lerobot_config(
    store: &dyn ConfigStore,
    config: &mut SessionConfig,
    arm: &ArmSetup,
) -> Result<(), ConfigError> {
    config.lerobot_mut().apply(arm);
    config.server_mut().server_type = Some(ServerType::Lerobot.as_str().to_string());
    store.save(config)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn store_in(dir: &Path) -> JsonFileStore {
        JsonFileStore::new(dir.join("config.json"))
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!(store.load().unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_malformed_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Malformed { .. })));
        assert_eq!(store.load_or_default(), SessionConfig::default());
    }

    #[test]
    fn test_unknown_sections_survive_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let raw = json!({
            "telemetry": {"enabled": false},
            "server": {"type": "ollama", "port": 11434, "gpu_layers": 33},
            "lerobot": {"leader_port": "/dev/ttyACM0", "notes": "bench 2"}
        });
        fs::write(store.path(), raw.to_string()).unwrap();

        let config = store.load().unwrap();
        store.save(&config).unwrap();
        let reread: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(reread, raw);
    }

    #[test]
    fn test_save_writes_four_space_indent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path().join("nested").as_path());
        let mut config = SessionConfig::default();
        config.server_mut().server_type = Some("vllm".into());
        store.save(&config).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n    \"server\""));
    }

    #[test]
    fn test_save_lerobot_config_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut config = SessionConfig::default();
        let arm = ArmSetup {
            robot_type: Some(RobotKind::So101),
            leader_port: Some("/dev/ttyACM0".into()),
            follower_port: Some("/dev/ttyACM1".into()),
            leader_calibrated: true,
            follower_calibrated: true,
            ..Default::default()
        };

        save_lerobot_config(&store, &mut config, &arm).unwrap();
        let first = fs::read_to_string(store.path()).unwrap();
        save_lerobot_config(&store, &mut config, &arm).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.server.unwrap().server_type.as_deref(), Some("lerobot"));
        let arms = loaded.lerobot.unwrap().calibrated_arms().unwrap();
        assert_eq!(arms.follower_port, "/dev/ttyACM1");
        assert_eq!(arms.kind, RobotKind::So101);
    }

    #[test]
    fn test_arm_setup_always_serialises_calibration_flags() {
        let value = serde_json::to_value(ArmSetup::new(RobotKind::So100)).unwrap();
        assert_eq!(value["leader_calibrated"], json!(false));
        assert_eq!(value["follower_calibrated"], json!(false));
        assert_eq!(value["robot_type"], json!("so100"));
    }

    #[test]
    fn test_partial_calibration_reported_even_with_empty_config() {
        let arm = ArmSetup {
            leader_port: Some("/dev/ttyUSB0".into()),
            follower_port: Some("/dev/ttyUSB1".into()),
            leader_calibrated: true,
            follower_calibrated: false,
            ..Default::default()
        };
        assert_eq!(
            check_calibration_success(&arm, false),
            CalibrationReport::Partial
        );
    }

    #[test]
    fn test_success_reports_motor_outcome_only_when_requested() {
        let mut arm = ArmSetup {
            leader_port: Some("/dev/ttyACM0".into()),
            follower_port: Some("/dev/ttyACM1".into()),
            leader_calibrated: true,
            follower_calibrated: true,
            leader_motors_setup: Some(true),
            follower_motors_setup: Some(false),
            ..Default::default()
        };
        assert_eq!(
            check_calibration_success(&arm, true),
            CalibrationReport::Success {
                motors: Some(false)
            }
        );
        assert_eq!(
            check_calibration_success(&arm, false),
            CalibrationReport::Success { motors: None }
        );
        arm.follower_motors_setup = Some(true);
        assert!(check_calibration_success(&arm, true).is_success());
    }

    #[test]
    fn test_failed_rerun_clears_previous_calibration_flag() {
        let mut section = LerobotSection {
            leader_calibrated: Some(true),
            follower_calibrated: Some(true),
            leader_port: Some("/dev/ttyACM0".into()),
            follower_port: Some("/dev/ttyACM1".into()),
            ..Default::default()
        };
        section.apply(&ArmSetup {
            leader_calibrated: true,
            follower_calibrated: false,
            ..Default::default()
        });
        assert!(section.calibrated_arms().is_none());
        assert_eq!(section.leader_port.as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_reset_removes_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("solo");
        let store = store_in(&root);
        store.save(&SessionConfig::default()).unwrap();
        store.reset().unwrap();
        assert!(!root.exists());
        store.reset().unwrap();
    }

    /// A user-chosen config directory may hold other files; only solo's own go
    #[test]
    fn test_reset_keeps_foreign_files() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("shared");
        let store = store_in(&root);
        store.save(&SessionConfig::default()).unwrap();
        fs::write(root.join("notes.txt"), "keep me").unwrap();

        store.reset().unwrap();
        assert!(!store.path().exists());
        assert_eq!(fs::read_to_string(root.join("notes.txt")).unwrap(), "keep me");
    }

    #[test]
    fn test_calibration_without_port_is_not_configured() {
        let complete = LerobotSection {
            leader_calibrated: Some(true),
            follower_calibrated: Some(true),
            leader_port: Some("/dev/ttyACM0".into()),
            follower_port: Some("/dev/ttyACM1".into()),
            ..Default::default()
        };
        assert!(complete.calibrated_arms().is_some());

        let no_leader = LerobotSection {
            leader_port: None,
            ..complete.clone()
        };
        assert!(no_leader.calibrated_arms().is_none());
        let no_follower = LerobotSection {
            follower_port: None,
            ..complete
        };
        assert!(no_follower.calibrated_arms().is_none());
    }
}
