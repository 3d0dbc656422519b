//! Shared fixtures for the command integration test suite.
//!
//! A [`Workbench`] wires the robot workflows to test doubles and a config file in a
//! temp dir, so whole sessions can be replayed without hardware.

use std::time::Duration;

use solo::{
    internal::{
        config::{ConfigStore, JsonFileStore, SessionConfig},
        robot::{
            RoboContext,
            cameras::{CameraBackend, CameraInfo, CameraProbe},
            modes::{self, Mode},
        },
    },
    utils::{
        operator::ScriptedOperator,
        test::{FakePortScanner, MockFramework, StubAccounts, StubCameraProbe},
    },
};
use tempfile::TempDir;

mod config_test;
mod robo_test;

pub struct Workbench {
    pub store: JsonFileStore,
    pub framework: MockFramework,
    pub scanner: FakePortScanner,
    pub probes: Vec<Box<dyn CameraProbe>>,
    pub accounts: StubAccounts,
    _dir: TempDir,
}

impl Workbench {
    /// One OpenCV camera at index 0; RealSense unavailable.
    pub fn new(framework: MockFramework, scanner: FakePortScanner, accounts: StubAccounts) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            store: JsonFileStore::new(dir.path().join("config.json")),
            framework,
            scanner,
            probes: vec![
                Box::new(StubCameraProbe::unavailable(CameraBackend::RealSense)),
                Box::new(StubCameraProbe::with(
                    CameraBackend::OpenCv,
                    vec![CameraInfo::opencv(0)],
                )),
            ],
            accounts,
            _dir: dir,
        }
    }

    /// Run one `solo robo` mode the way the command does: load, run, leave the result
    /// on disk. Returns the operator so its transcript can be inspected.
    pub async fn run(&self, mode: Mode, answers: &[&str]) -> ScriptedOperator {
        let mut operator = ScriptedOperator::new(answers.iter().copied());
        let mut config = self.store.load_or_default();
        let mut ctx = RoboContext {
            store: &self.store,
            framework: &self.framework,
            scanner: &self.scanner,
            cameras: &self.probes,
            accounts: &self.accounts,
            operator: &mut operator,
            settle: Duration::ZERO,
        };
        modes::run(mode, &mut ctx, &mut config).await.unwrap();
        operator
    }

    pub fn saved(&self) -> SessionConfig {
        self.store.load().unwrap()
    }
}

/// Port lists in the order the scanner is read during a two-arm detection.
pub fn plug_sequence(leader: &str, follower: &str) -> FakePortScanner {
    FakePortScanner::new([
        vec![],
        vec![leader.to_string()],
        vec![leader.to_string()],
        vec![leader.to_string(), follower.to_string()],
    ])
}
