//! Leader/follower robot-arm workflows.
//!
//! - `ports`: which serial port belongs to which arm.
//! - `cameras`: camera discovery and angle mapping.
//! - `framework`: the external robotics framework (LeRobot) behind a trait.
//! - `calibration`: motor-ID setup and calibration for both arms.
//! - `modes`: the `solo robo` modes built on top of the above.

pub mod calibration;
pub mod cameras;
pub mod framework;
pub mod modes;
pub mod ports;
pub mod settings;

use std::time::Duration;

use crate::{
    internal::{config::ConfigStore, hub::Accounts},
    utils::operator::Operator,
};

/// Collaborators a robotics workflow runs against.
pub struct RoboContext<'a> {
    pub store: &'a dyn ConfigStore,
    pub framework: &'a dyn framework::RobotFramework,
    pub scanner: &'a dyn ports::PortScanner,
    pub cameras: &'a [Box<dyn cameras::CameraProbe>],
    pub accounts: &'a dyn Accounts,
    pub operator: &'a mut dyn Operator,
    /// Pause after each plug/unplug before re-reading the port list.
    pub settle: Duration,
}
