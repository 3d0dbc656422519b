//! Camera discovery and angle assignment.
//!
//! Each backend is a [`CameraProbe`]. A probe that cannot run on this machine (no
//! `/dev/video*` support, RealSense tools not installed) reports
//! [`CameraProbeError::Unavailable`] and is skipped; the other backends still count.

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::utils::{
    operator::Operator,
    process::{ExternalCommand, ProcessError},
};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

const ANGLE_SUGGESTIONS: [&str; 4] = ["front", "top", "side", "wrist"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    OpenCv,
    RealSense,
}

impl CameraBackend {
    /// Name of the camera type in LeRobot's camera config.
    pub fn framework_type(&self) -> &'static str {
        match self {
            CameraBackend::OpenCv => "opencv",
            CameraBackend::RealSense => "intelrealsense",
        }
    }
}

impl fmt::Display for CameraBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraBackend::OpenCv => f.write_str("OpenCV"),
            CameraBackend::RealSense => f.write_str("RealSense"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub backend: CameraBackend,
    /// Device index for OpenCV, serial number for RealSense.
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CameraInfo {
    pub fn opencv(index: u32) -> Self {
        Self {
            backend: CameraBackend::OpenCv,
            id: index.to_string(),
            name: format!("OpenCV Camera @ {index}"),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }

    pub fn realsense(serial: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            backend: CameraBackend::RealSense,
            id: serial.into(),
            name: name.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }

    fn framework_entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("type".into(), json!(self.backend.framework_type()));
        match self.backend {
            CameraBackend::OpenCv => {
                let index_or_path = match self.id.parse::<u32>() {
                    Ok(index) => json!(index),
                    Err(_) => json!(self.id),
                };
                entry.insert("index_or_path".into(), index_or_path);
            }
            CameraBackend::RealSense => {
                entry.insert("serial_number_or_name".into(), json!(self.id));
            }
        }
        entry.insert("width".into(), json!(self.width));
        entry.insert("height".into(), json!(self.height));
        entry.insert("fps".into(), json!(self.fps));
        Value::Object(entry)
    }
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}] {}x{}@{}fps",
            self.name, self.backend, self.id, self.width, self.height, self.fps
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedCamera {
    pub angle: String,
    #[serde(flatten)]
    pub camera: CameraInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSetup {
    pub enabled: bool,
    #[serde(default)]
    pub cameras: Vec<MappedCamera>,
}

impl CameraSetup {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.cameras.is_empty()
    }

    /// JSON map from angle to camera config, as `--robot.cameras` expects it.
    /// `None` when no camera is in use.
    pub fn to_framework_arg(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        let map: Map<String, Value> = self
            .cameras
            .iter()
            .map(|c| (c.angle.clone(), c.camera.framework_entry()))
            .collect();
        Some(Value::Object(map).to_string())
    }
}

#[derive(Debug, Error)]
pub enum CameraProbeError {
    #[error("{backend} cameras unavailable: {reason}")]
    Unavailable {
        backend: CameraBackend,
        reason: String,
    },

    #[error("{backend} probe failed: {reason}")]
    Failed {
        backend: CameraBackend,
        reason: String,
    },
}

#[async_trait]
pub trait CameraProbe: Send + Sync {
    fn backend(&self) -> CameraBackend;
    async fn probe(&self) -> Result<Vec<CameraInfo>, CameraProbeError>;
}

/// V4L2 device nodes (`/dev/video<N>`); index is the numeric suffix.
#[derive(Debug, Clone)]
pub struct OpenCvProbe {
    dev_dir: PathBuf,
}

impl Default for OpenCvProbe {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
        }
    }
}

impl OpenCvProbe {
    pub fn with_dev_dir(dev_dir: impl AsRef<Path>) -> Self {
        Self {
            dev_dir: dev_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CameraProbe for OpenCvProbe {
    fn backend(&self) -> CameraBackend {
        CameraBackend::OpenCv
    }

    async fn probe(&self) -> Result<Vec<CameraInfo>, CameraProbeError> {
        let entries = std::fs::read_dir(&self.dev_dir).map_err(|e| CameraProbeError::Unavailable {
            backend: CameraBackend::OpenCv,
            reason: format!("cannot list {}: {e}", self.dev_dir.display()),
        })?;
        let mut indices: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?.strip_prefix("video")?.parse::<u32>().ok()
            })
            .collect();
        indices.sort_unstable();
        Ok(indices.into_iter().map(CameraInfo::opencv).collect())
    }
}

/// Intel RealSense devices via `rs-enumerate-devices -s` from librealsense.
#[derive(Debug, Clone, Default)]
pub struct RealSenseProbe;

#[async_trait]
impl CameraProbe for RealSenseProbe {
    fn backend(&self) -> CameraBackend {
        CameraBackend::RealSense
    }

    async fn probe(&self) -> Result<Vec<CameraInfo>, CameraProbeError> {
        let output = ExternalCommand::new("rs-enumerate-devices")
            .arg("-s")
            .output()
            .await
            .map_err(|e| match e {
                ProcessError::NotFound(_) => CameraProbeError::Unavailable {
                    backend: CameraBackend::RealSense,
                    reason: "librealsense tools are not installed".to_string(),
                },
                other => CameraProbeError::Failed {
                    backend: CameraBackend::RealSense,
                    reason: other.to_string(),
                },
            })?;
        if !output.success() {
            return Err(CameraProbeError::Failed {
                backend: CameraBackend::RealSense,
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(parse_realsense_summary(&output.stdout))
    }
}

/// Parse the short table printed by `rs-enumerate-devices -s`:
///
/// ```text
/// Device Name                   Serial Number       Firmware Version
/// Intel RealSense D435          012345678901        05.12.07.100
/// ```
pub fn parse_realsense_summary(text: &str) -> Vec<CameraInfo> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("Device Name"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            // The serial sits right before the dotted firmware version and may hold letters.
            let firmware_at = tokens.iter().position(|t| is_firmware_version(t))?;
            let serial_at = firmware_at.checked_sub(1).filter(|&i| i > 0)?;
            let serial = tokens[serial_at];
            if !serial.chars().all(|c| c.is_ascii_alphanumeric())
                || !serial.chars().any(|c| c.is_ascii_digit())
            {
                return None;
            }
            let name = tokens[..serial_at].join(" ");
            Some(CameraInfo::realsense(serial, name))
        })
        .collect()
}

fn is_firmware_version(token: &str) -> bool {
    token.contains('.')
        && token
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Every camera the probes can see. A failing backend is logged and skipped.
pub async fn find_available_cameras(probes: &[Box<dyn CameraProbe>]) -> Vec<CameraInfo> {
    let mut found = Vec::new();
    for probe in probes {
        match probe.probe().await {
            Ok(cameras) => {
                tracing::debug!(backend = %probe.backend(), count = cameras.len(), "camera probe finished");
                found.extend(cameras);
            }
            Err(e) => tracing::info!(backend = %probe.backend(), error = %e, "skipping camera backend"),
        }
    }
    found
}

/// Parse a comma-separated list of 1-based camera numbers.
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>, String> {
    let mut picked = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part
            .parse()
            .map_err(|_| format!("'{part}' is not a camera number"))?;
        if !(1..=count).contains(&n) {
            return Err(format!("camera {n} does not exist (choose 1-{count})"));
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    if picked.is_empty() {
        return Err("select at least one camera".to_string());
    }
    Ok(picked)
}

fn ask_angle(operator: &mut dyn Operator, camera: &CameraInfo, suggestion: &str, taken: &HashSet<String>) -> String {
    let answer = operator.ask(
        &format!("Viewing angle for {}", camera.name),
        Some(suggestion),
    );
    let base = answer.trim().to_lowercase().replace(' ', "_");
    let base = if base.is_empty() { suggestion.to_string() } else { base };
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

/// Assign an angle label to each camera and let the operator pick which ones to use.
pub fn setup_camera_mapping(cameras: Vec<CameraInfo>, operator: &mut dyn Operator) -> CameraSetup {
    if cameras.is_empty() {
        println!("No cameras detected.");
        return CameraSetup::disabled();
    }

    println!("\nFound {} camera(s):", cameras.len());
    for (i, camera) in cameras.iter().enumerate() {
        println!("  {}. {}", i + 1, camera);
    }

    let mut taken = HashSet::new();
    let mut mapped = Vec::with_capacity(cameras.len());
    for (i, camera) in cameras.into_iter().enumerate() {
        let suggestion = ANGLE_SUGGESTIONS
            .get(i)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("camera_{}", i + 1));
        let angle = ask_angle(operator, &camera, &suggestion, &taken);
        taken.insert(angle.clone());
        mapped.push(MappedCamera { angle, camera });
    }

    if mapped.len() == 1 {
        return CameraSetup {
            enabled: true,
            cameras: mapped,
        };
    }

    let all = (1..=mapped.len())
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let selection = loop {
        let answer = operator.ask(
            "Which cameras should be used? (comma-separated numbers)",
            Some(&all),
        );
        match parse_selection(&answer, mapped.len()) {
            Ok(selection) => break selection,
            Err(e) => println!("{e}"),
        }
    };

    let cameras = mapped
        .into_iter()
        .enumerate()
        .filter(|(i, _)| selection.contains(i))
        .map(|(_, c)| c)
        .collect();
    CameraSetup {
        enabled: true,
        cameras,
    }
}

pub async fn setup_cameras(probes: &[Box<dyn CameraProbe>], operator: &mut dyn Operator) -> CameraSetup {
    println!("Scanning for cameras...");
    let cameras = find_available_cameras(probes).await;
    setup_camera_mapping(cameras, operator)
}

/// The probes solo uses on a real machine.
pub fn default_probes() -> Vec<Box<dyn CameraProbe>> {
    vec![Box::new(OpenCvProbe::default()), Box::new(RealSenseProbe)]
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::utils::{operator::ScriptedOperator, test::StubCameraProbe};

    #[tokio::test]
    async fn test_unavailable_backend_is_skipped() {
        let probes: Vec<Box<dyn CameraProbe>> = vec![
            Box::new(StubCameraProbe::unavailable(CameraBackend::RealSense)),
            Box::new(StubCameraProbe::with(CameraBackend::OpenCv, vec![CameraInfo::opencv(0)])),
        ];
        let found = find_available_cameras(&probes).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].backend, CameraBackend::OpenCv);
    }

    #[tokio::test]
    async fn test_opencv_probe_reads_video_nodes() {
        let dir = tempdir().unwrap();
        for name in ["video2", "video0", "videoX", "ttyACM0"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let cameras = OpenCvProbe::with_dev_dir(dir.path()).probe().await.unwrap();
        let ids: Vec<_> = cameras.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["0", "2"]);
    }

    #[test]
    fn test_parse_realsense_summary() {
        let text = "Device Name                   Serial Number       Firmware Version\n\
                    Intel RealSense D435          012345678901        05.12.07.100\n";
        let cameras = parse_realsense_summary(text);
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].id, "012345678901");
        assert_eq!(cameras[0].name, "Intel RealSense D435");
    }

    #[test]
    fn test_parse_realsense_summary_alphanumeric_serial() {
        let text = "Device Name                   Serial Number       Firmware Version\n\
                    Intel RealSense L515          f0123456            01.05.08.01\n\
                    Intel RealSense D455          213622251234        05.13.00.50\n";
        let cameras = parse_realsense_summary(text);
        let ids: Vec<&str> = cameras.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["f0123456", "213622251234"]);
        assert_eq!(cameras[0].name, "Intel RealSense L515");
        assert!(parse_realsense_summary("No device detected. Is it plugged in?\n").is_empty());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1, 3", 3).unwrap(), vec![0, 2]);
        assert_eq!(parse_selection("2,2", 3).unwrap(), vec![1]);
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("a", 3).is_err());
        assert!(parse_selection(" ", 3).is_err());
    }

    #[test]
    fn test_single_camera_only_asks_angle() {
        let mut op = ScriptedOperator::new(["Top View"]);
        let setup = setup_camera_mapping(vec![CameraInfo::opencv(0)], &mut op);
        assert!(setup.enabled);
        assert_eq!(setup.cameras[0].angle, "top_view");
        assert_eq!(op.transcript.len(), 1);
    }

    #[test]
    fn test_multiple_cameras_reprompt_until_valid_selection() {
        let mut op = ScriptedOperator::new(["front", "front", "9", "2"]);
        let cameras = vec![
            CameraInfo::opencv(0),
            CameraInfo::realsense("012345678901", "Intel RealSense D405"),
        ];
        let setup = setup_camera_mapping(cameras, &mut op);
        assert_eq!(setup.cameras.len(), 1);
        assert_eq!(setup.cameras[0].angle, "front_2");
        assert_eq!(setup.cameras[0].camera.backend, CameraBackend::RealSense);
    }

    #[test]
    fn test_no_cameras_disables_setup() {
        let mut op = ScriptedOperator::default();
        let setup = setup_camera_mapping(vec![], &mut op);
        assert!(!setup.enabled);
        assert!(setup.to_framework_arg().is_none());
    }

    #[test]
    fn test_framework_arg_shape() {
        let setup = CameraSetup {
            enabled: true,
            cameras: vec![
                MappedCamera {
                    angle: "front".into(),
                    camera: CameraInfo::opencv(4),
                },
                MappedCamera {
                    angle: "wrist".into(),
                    camera: CameraInfo::realsense("123456789", "D405"),
                },
            ],
        };
        let value: Value = serde_json::from_str(&setup.to_framework_arg().unwrap()).unwrap();
        assert_eq!(value["front"]["type"], "opencv");
        assert_eq!(value["front"]["index_or_path"], 4);
        assert_eq!(value["wrist"]["serial_number_or_name"], "123456789");
        assert_eq!(value["wrist"]["fps"], 30);
    }
}
