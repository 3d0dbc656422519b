//! Test doubles for the hardware and account seams, plus an env guard for the config
//! directory. Shared by unit tests and the integration tests under `tests/`.

use std::{
    collections::VecDeque,
    ffi::OsString,
    path::Path,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::{
    internal::{
        hub::Accounts,
        robot::{
            cameras::{CameraBackend, CameraInfo, CameraProbe, CameraProbeError},
            framework::{
                ArmRole, DeviceConfig, FrameworkError, InferenceRequest, RecordRequest,
                RobotFramework, TeleopRequest, TrainRequest,
            },
            ports::PortScanner,
        },
    },
    utils::path::CONFIG_DIR_ENV,
};

/// Points `SOLO_CONFIG_DIR` at a directory for the guard's lifetime.
/// Tests using it must be `#[serial]`.
pub struct ConfigDirGuard {
    previous: Option<OsString>,
}

impl ConfigDirGuard {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let previous = std::env::var_os(CONFIG_DIR_ENV);
        // SAFETY: callers are serialised, no other thread reads the environment meanwhile.
        unsafe { std::env::set_var(CONFIG_DIR_ENV, dir.as_ref()) };
        Self { previous }
    }
}

impl Drop for ConfigDirGuard {
    fn drop(&mut self) {
        // SAFETY: see `ConfigDirGuard::new`.
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(CONFIG_DIR_ENV, value),
                None => std::env::remove_var(CONFIG_DIR_ENV),
            }
        }
    }
}

/// Returns queued snapshots in order; the last one repeats once the queue drains.
pub struct FakePortScanner {
    snapshots: Mutex<VecDeque<Vec<String>>>,
    last: Mutex<Vec<String>>,
}

impl FakePortScanner {
    pub fn new<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        Self {
            snapshots: Mutex::new(snapshots.into_iter().collect()),
            last: Mutex::new(Vec::new()),
        }
    }
}

impl PortScanner for FakePortScanner {
    fn available_ports(&self) -> Vec<String> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(snapshot) = next {
            *last = snapshot;
        }
        last.clone()
    }
}

/// Records every call; outcomes are configured per operation.
#[derive(Debug)]
pub struct MockFramework {
    pub available: bool,
    pub fail_calibrate: Vec<ArmRole>,
    pub fail_motors: Vec<ArmRole>,
    /// Teleoperation, recording and inference end as if Ctrl-C was pressed.
    pub interrupt_sessions: bool,
    /// Teleoperation, recording, training and inference exit non-zero.
    pub fail_sessions: bool,
    /// Every call made, in order. Read it through [`MockFramework::calls`].
    pub calls: Mutex<Vec<String>>,
}

impl Default for MockFramework {
    fn default() -> Self {
        Self {
            available: true,
            fail_calibrate: Vec::new(),
            fail_motors: Vec::new(),
            interrupt_sessions: false,
            fail_sessions: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockFramework {
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_call(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn session_outcome(&self, step: &'static str) -> Result<(), FrameworkError> {
        if self.interrupt_sessions {
            Err(FrameworkError::Interrupted(step))
        } else if self.fail_sessions {
            Err(FrameworkError::Failed { step, code: 1 })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RobotFramework for MockFramework {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn calibrate(&self, device: &DeviceConfig) -> Result<(), FrameworkError> {
        self.record_call(format!("calibrate {} {}", device.id, device.port));
        if self.fail_calibrate.contains(&device.role) {
            return Err(FrameworkError::Failed {
                step: "calibration",
                code: 1,
            });
        }
        Ok(())
    }

    async fn setup_motors(&self, device: &DeviceConfig) -> Result<(), FrameworkError> {
        self.record_call(format!("setup_motors {} {}", device.id, device.port));
        if self.fail_motors.contains(&device.role) {
            return Err(FrameworkError::Failed {
                step: "motor setup",
                code: 1,
            });
        }
        Ok(())
    }

    async fn teleoperate(&self, request: &TeleopRequest) -> Result<(), FrameworkError> {
        self.record_call(format!(
            "teleoperate {} {} cameras={}",
            request.leader.port,
            request.follower.port,
            request.cameras.cameras.len()
        ));
        self.session_outcome("teleoperation")
    }

    async fn record(&self, request: &RecordRequest) -> Result<(), FrameworkError> {
        self.record_call(format!(
            "record {} episodes={}",
            request.settings.dataset_repo_id, request.settings.episodes
        ));
        self.session_outcome("recording")
    }

    async fn train(&self, request: &TrainRequest) -> Result<(), FrameworkError> {
        self.record_call(format!(
            "train {} {}",
            request.settings.policy_type, request.settings.dataset_repo_id
        ));
        if self.fail_sessions {
            return Err(FrameworkError::Failed {
                step: "training",
                code: 1,
            });
        }
        Ok(())
    }

    async fn infer(&self, request: &InferenceRequest) -> Result<(), FrameworkError> {
        self.record_call(format!("infer {}", request.settings.policy_path));
        self.session_outcome("inference")
    }
}

/// Camera probe with a fixed answer.
pub struct StubCameraProbe {
    backend: CameraBackend,
    cameras: Option<Vec<CameraInfo>>,
}

impl StubCameraProbe {
    pub fn with(backend: CameraBackend, cameras: Vec<CameraInfo>) -> Self {
        Self {
            backend,
            cameras: Some(cameras),
        }
    }

    pub fn unavailable(backend: CameraBackend) -> Self {
        Self {
            backend,
            cameras: None,
        }
    }
}

#[async_trait]
impl CameraProbe for StubCameraProbe {
    fn backend(&self) -> CameraBackend {
        self.backend
    }

    async fn probe(&self) -> Result<Vec<CameraInfo>, CameraProbeError> {
        self.cameras
            .clone()
            .ok_or_else(|| CameraProbeError::Unavailable {
                backend: self.backend,
                reason: "stub".to_string(),
            })
    }
}

/// Accounts with a fixed login state. A successful `hf_login` logs the user in.
#[derive(Debug, Default)]
pub struct StubAccounts {
    /// The Hugging Face user currently logged in.
    pub user: Mutex<Option<String>>,
    pub login_as: Option<String>,
    pub wandb_ok: bool,
}

impl StubAccounts {
    pub fn logged_in(user: &str) -> Self {
        Self {
            user: Mutex::new(Some(user.to_string())),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Accounts for StubAccounts {
    async fn hf_whoami(&self) -> Option<String> {
        self.user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn hf_login(&self) -> bool {
        match &self.login_as {
            Some(user) => {
                *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
                true
            }
            None => false,
        }
    }

    async fn wandb_login(&self) -> bool {
        self.wandb_ok
    }
}
