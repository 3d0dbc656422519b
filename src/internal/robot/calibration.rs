//! Motor-ID setup and calibration of a leader/follower pair.
//!
//! Each arm is handled independently: a failed detection, motor setup or
//! calibration on one arm is reported and the run moves on to the next arm. The
//! resulting [`ArmSetup`] always records both calibration flags.

use colored::Colorize;

use crate::internal::{
    config::ArmSetup,
    robot::{
        RoboContext,
        framework::{ArmRole, DeviceConfig, RobotFramework, RobotKind},
        ports::detect_arm_port,
    },
};

/// Calibrate one arm. Failures are printed and reported as `false`.
pub async fn calibrate_arm(
    framework: &dyn RobotFramework,
    role: ArmRole,
    port: &str,
    kind: RobotKind,
) -> bool {
    let device = DeviceConfig::new(kind, role, port);
    println!("\nCalibrating {role} arm on port {port}...");
    println!("Please follow the calibration instructions that will appear.");
    match framework.calibrate(&device).await {
        Ok(()) => {
            println!("{}", format!("{} arm calibrated successfully!", role.title()).green());
            true
        }
        Err(e) => {
            tracing::warn!(arm = %role, port, error = %e, "calibration failed");
            println!("{}", format!("Calibration failed for {role} arm: {e}").red());
            false
        }
    }
}

/// Assign motor IDs on one arm. Failures are printed and reported as `false`.
pub async fn setup_motors_for_arm(
    framework: &dyn RobotFramework,
    role: ArmRole,
    port: &str,
    kind: RobotKind,
) -> bool {
    let device = DeviceConfig::new(kind, role, port);
    println!("\nSetting up motor IDs for {role} arm on port {port}...");
    println!("You will be asked to connect each motor individually.");
    println!("Make sure your arm is powered on and ready.");
    match framework.setup_motors(&device).await {
        Ok(()) => {
            println!("{}", format!("Motor setup completed for {role} arm!").green());
            true
        }
        Err(e) => {
            tracing::warn!(arm = %role, port, error = %e, "motor setup failed");
            println!("{}", format!("Motor setup failed for {role} arm: {e}").red());
            false
        }
    }
}

pub fn select_robot_kind(ctx: &mut RoboContext<'_>) -> RobotKind {
    println!("\nSelect your robot type:");
    let options: Vec<String> = RobotKind::ALL.iter().map(|k| k.label().to_string()).collect();
    let index = ctx.operator.choose("Enter robot type", &options, 0);
    RobotKind::ALL[index.min(RobotKind::ALL.len() - 1)]
}

/// Detect and calibrate both arms.
pub async fn calibration(ctx: &mut RoboContext<'_>) -> ArmSetup {
    run_arm_setup(ctx, false).await
}

/// Detect both arms, set up their motor IDs, then calibrate them.
pub async fn setup_motors_and_calibration(ctx: &mut RoboContext<'_>) -> ArmSetup {
    run_arm_setup(ctx, true).await
}

async fn run_arm_setup(ctx: &mut RoboContext<'_>, with_motors: bool) -> ArmSetup {
    let kind = select_robot_kind(ctx);
    let mut arm = ArmSetup::new(kind);

    for role in [ArmRole::Leader, ArmRole::Follower] {
        println!("\n{}", format!("Setting up {} Arm", role.title()).bold());
        let Some(port) =
            detect_arm_port(role.as_str(), ctx.scanner, &mut *ctx.operator, ctx.settle).await
        else {
            println!("{}", format!("Failed to detect {role} arm. Skipping its setup.").red());
            continue;
        };
        arm.set_port(role, port.clone());

        if with_motors {
            let ok = setup_motors_for_arm(ctx.framework, role, &port, kind).await;
            arm.set_motors_setup(role, ok);
            if !ok {
                println!(
                    "{}",
                    format!("{} arm motor setup failed. Continuing with calibration anyway.", role.title())
                        .yellow()
                );
            }
        }

        let calibrated = calibrate_arm(ctx.framework, role, &port, kind).await;
        arm.set_calibrated(role, calibrated);
        if !calibrated && role == ArmRole::Leader {
            println!("Leader arm calibration failed. Continuing with follower setup.");
        }
    }
    arm
}

pub fn display_calibration_error() {
    println!("{}", "Arms are not properly calibrated.".red());
    println!("Please run one of the following first:");
    println!("   • 'solo robo --type lerobot --calibrate' - Configure arms only");
    println!(
        "   • 'solo robo --type lerobot' - Full setup (motors + calibration + teleoperation)"
    );
}

pub fn display_arms_status(kind: RobotKind, leader_port: &str, follower_port: &str) {
    println!("{}", "Found calibrated arms:".green());
    println!("   • Robot type: {}", kind.label());
    println!("   • Leader arm: {leader_port}");
    println!("   • Follower arm: {follower_port}");
}
