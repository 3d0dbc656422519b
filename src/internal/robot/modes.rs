//! The `solo robo` modes.
//!
//! Each mode works on the loaded [`SessionConfig`], drives the framework through the
//! [`RoboContext`] and persists what it learned. Failures of the external framework
//! are reported to the operator and end the mode; only persistence errors propagate.

use colored::Colorize;

use crate::{
    internal::{
        config::{CalibratedArms, ConfigError, SessionConfig, check_calibration_success, save_lerobot_config},
        robot::{
            RoboContext,
            calibration::{
                calibration, display_arms_status, display_calibration_error,
                setup_motors_and_calibration,
            },
            cameras::{CameraSetup, setup_cameras},
            framework::{
                FrameworkError, INSTALL_HINT, InferenceRequest, RecordRequest, TeleopRequest,
                TrainRequest,
            },
            settings::{
                InferenceSettings, POLICY_TYPES, RECORD_FPS, RecordingSettings, TELEOP_FPS,
                TeleopSettings, TrainingSettings,
            },
        },
    },
    utils::operator::{Operator, ask_parsed},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Calibrate,
    Teleoperate,
    Record,
    Train,
    Inference,
    FullSetup,
}

impl Mode {
    /// The first set flag wins, in the order inference, train, record, teleop,
    /// calibrate. No flag means full setup.
    pub fn from_flags(calibrate: bool, teleop: bool, record: bool, train: bool, inference: bool) -> Self {
        if inference {
            Mode::Inference
        } else if train {
            Mode::Train
        } else if record {
            Mode::Record
        } else if teleop {
            Mode::Teleoperate
        } else if calibrate {
            Mode::Calibrate
        } else {
            Mode::FullSetup
        }
    }
}

pub async fn run(mode: Mode, ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    if !ctx.framework.is_available().await {
        println!("{}", "LeRobot package not found.".red());
        println!("Install it with `{INSTALL_HINT}`, or run 'solo setup' and select LeRobot.");
        return Ok(());
    }
    tracing::debug!(?mode, "starting robo mode");
    match mode {
        Mode::Calibrate => calibration_mode(ctx, config).await,
        Mode::Teleoperate => teleop_mode(ctx, config).await,
        Mode::Record => recording_mode(ctx, config).await,
        Mode::Train => training_mode(ctx, config).await,
        Mode::Inference => inference_mode(ctx, config).await,
        Mode::FullSetup => setup_mode(ctx, config).await,
    }
}

pub async fn calibration_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting LeRobot calibration mode...".bold());
    let setup_motors = ctx
        .operator
        .confirm("Would you like to setup motor IDs first?", true);
    let arm = if setup_motors {
        setup_motors_and_calibration(ctx).await
    } else {
        println!("\nStarting arm calibration...");
        calibration(ctx).await
    };

    save_lerobot_config(ctx.store, config, &arm)?;
    println!("\nConfiguration saved to {}", ctx.store.path().display());
    check_calibration_success(&arm, setup_motors).print();
    Ok(())
}

pub async fn setup_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting full LeRobot setup...".bold());
    println!("This will run: motor setup → calibration → teleoperation\n");
    println!("Step 1/3: Setting up motor IDs and calibration...");
    let mut arm = setup_motors_and_calibration(ctx).await;
    save_lerobot_config(ctx.store, config, &arm)?;

    let report = check_calibration_success(&arm, true);
    let arms = match (report.is_success(), config.lerobot.as_ref().and_then(|l| l.calibrated_arms())) {
        (true, Some(arms)) => arms,
        _ => {
            println!("\n{}", "Calibration failed. Skipping teleoperation.".yellow());
            println!("You can run 'solo robo --type lerobot --calibrate' to retry calibration.");
            return Ok(());
        }
    };
    if arm.motors_ok() == Some(true) {
        println!("{}", "Motor IDs set up successfully for both arms.".green());
    } else {
        println!(
            "{}",
            "Some motor setups may have failed, but calibration completed.".yellow()
        );
    }

    // Cameras from an earlier run, else ask once and keep the answer.
    let saved_cameras = config
        .lerobot
        .as_ref()
        .and_then(|l| l.cameras.clone().or_else(|| l.teleop.as_ref().map(|t| t.cameras.clone())));
    let cameras = match saved_cameras {
        Some(cameras) => cameras,
        None => {
            let cameras = ask_cameras(ctx).await;
            arm.cameras = Some(cameras.clone());
            save_lerobot_config(ctx.store, config, &arm)?;
            cameras
        }
    };

    println!("\nStep 3/3: Starting teleoperation...");
    if teleoperation(ctx, &arms, &cameras).await {
        println!("{}", "Full LeRobot setup completed successfully!".green().bold());
    } else {
        println!("{}", "Setup completed but teleoperation failed.".yellow());
    }
    Ok(())
}

pub async fn teleop_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting LeRobot teleoperation mode...".bold());
    let Some(arms) = require_calibrated(config) else {
        return Ok(());
    };

    let saved = config.lerobot.as_ref().and_then(|l| l.teleop.clone());
    let settings = match reuse_saved(ctx.operator, "teleoperation", saved) {
        Some(settings) => settings,
        None => TeleopSettings {
            fps: TELEOP_FPS,
            cameras: ask_cameras(ctx).await,
        },
    };

    if teleoperation(ctx, &arms, &settings.cameras).await {
        println!("{}", "Teleoperation completed.".green());
        config.lerobot_mut().teleop = Some(settings);
        ctx.store.save(config)?;
    } else {
        println!("{}", "Teleoperation failed.".red());
    }
    Ok(())
}

pub async fn recording_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting LeRobot recording mode...".bold());
    let Some(arms) = require_calibrated(config) else {
        return Ok(());
    };

    let saved = config.lerobot.as_ref().and_then(|l| l.recording.clone());
    let settings = match reuse_saved(ctx.operator, "recording", saved) {
        Some(settings) => settings,
        None => {
            let push_to_hub = ctx
                .operator
                .confirm("Push the dataset to the Hugging Face Hub when done?", true);
            let user = if push_to_hub {
                match ensure_hf_login(ctx).await {
                    Some(user) => user,
                    None => {
                        println!(
                            "{}",
                            "Hugging Face login is required to push datasets. Recording cancelled.".red()
                        );
                        return Ok(());
                    }
                }
            } else {
                ctx.accounts.hf_whoami().await.unwrap_or_else(|| "local".to_string())
            };
            let default_repo = format!("{user}/{}_dataset", arms.kind);
            let dataset_repo_id = ctx.operator.ask("Dataset repository id", Some(&default_repo));
            let task = ctx
                .operator
                .ask("Task description", Some("Pick up the object and place it in the box"));
            let episodes = ask_parsed(&mut *ctx.operator, "Number of episodes", 5u32);
            let episode_time_s = ask_parsed(&mut *ctx.operator, "Episode duration (seconds)", 60u32);
            let reset_time_s = ask_parsed(&mut *ctx.operator, "Reset time between episodes (seconds)", 10u32);
            RecordingSettings {
                dataset_repo_id,
                task,
                episodes,
                episode_time_s,
                reset_time_s,
                fps: RECORD_FPS,
                push_to_hub,
                cameras: ask_cameras(ctx).await,
            }
        }
    };

    let (leader, follower) = arms.kind.device_pair(&arms.leader_port, &arms.follower_port);
    let request = RecordRequest {
        leader,
        follower,
        settings: settings.clone(),
    };
    println!("\nRecording {} episode(s) into {}", settings.episodes, settings.dataset_repo_id);
    println!("Press Ctrl+C to stop early.");
    match ctx.framework.record(&request).await {
        Ok(()) | Err(FrameworkError::Interrupted(_)) => {
            println!("{}", format!("Dataset saved as {}", settings.dataset_repo_id).green());
            if settings.push_to_hub {
                println!("https://huggingface.co/datasets/{}", settings.dataset_repo_id);
            }
            config.lerobot_mut().recording = Some(settings);
            ctx.store.save(config)?;
        }
        Err(e) => println!("{}", format!("Recording failed: {e}").red()),
    }
    Ok(())
}

pub async fn training_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting LeRobot training mode...".bold());

    let saved = config.lerobot.as_ref().and_then(|l| l.training.clone());
    let settings = match reuse_saved(ctx.operator, "training", saved) {
        Some(settings) => settings,
        None => {
            let last_dataset = config
                .lerobot
                .as_ref()
                .and_then(|l| l.recording.as_ref())
                .map(|r| r.dataset_repo_id.clone());
            let dataset_repo_id = ctx
                .operator
                .ask("Dataset repository id to train on", last_dataset.as_deref());
            if dataset_repo_id.trim().is_empty() {
                println!("{}", "A dataset is required for training.".red());
                return Ok(());
            }
            let policies: Vec<String> = POLICY_TYPES.iter().map(|p| p.to_string()).collect();
            println!("\nSelect a policy type:");
            let policy_type = policies[ctx.operator.choose("Policy", &policies, 0)].clone();
            let dataset_name = dataset_repo_id.rsplit('/').next().unwrap_or(dataset_repo_id.as_str());
            let default_output = format!("outputs/train/{policy_type}_{dataset_name}");
            let output_dir = ctx.operator.ask("Output directory", Some(&default_output));
            let steps = ask_parsed(&mut *ctx.operator, "Training steps", 100_000u32);
            let batch_size = ask_parsed(&mut *ctx.operator, "Batch size", 8u32);
            let default_device = config
                .system_info
                .as_ref()
                .map(|info| info.torch_device())
                .unwrap_or("cpu");
            let device = ctx.operator.ask("Training device (cuda, mps, cpu)", Some(default_device));
            let wandb = ctx
                .operator
                .confirm("Log training to Weights & Biases?", false);
            TrainingSettings {
                dataset_repo_id,
                policy_type,
                output_dir,
                steps,
                batch_size,
                device,
                wandb,
            }
        }
    };

    let mut settings = settings;
    if settings.wandb && !ctx.accounts.wandb_login().await {
        println!("{}", "Weights & Biases login failed; training without it.".yellow());
        settings.wandb = false;
    }

    println!(
        "\nTraining {} on {} (output: {})",
        settings.policy_type, settings.dataset_repo_id, settings.output_dir
    );
    let request = TrainRequest {
        settings: settings.clone(),
    };
    match ctx.framework.train(&request).await {
        Ok(()) => {
            println!("{}", "Training completed.".green());
            println!("Checkpoint: {}", settings.last_checkpoint());
            config.lerobot_mut().training = Some(settings);
            ctx.store.save(config)?;
        }
        Err(FrameworkError::Interrupted(_)) => {
            println!("{}", "Training interrupted by user.".yellow());
        }
        Err(e) => println!("{}", format!("Training failed: {e}").red()),
    }
    Ok(())
}

pub async fn inference_mode(ctx: &mut RoboContext<'_>, config: &mut SessionConfig) -> Result<(), ConfigError> {
    println!("{}", "Starting LeRobot inference mode...".bold());
    let Some(arms) = require_calibrated(config) else {
        return Ok(());
    };

    let saved = config.lerobot.as_ref().and_then(|l| l.inference.clone());
    let settings = match reuse_saved(ctx.operator, "inference", saved) {
        Some(settings) => settings,
        None => {
            let last_checkpoint = config
                .lerobot
                .as_ref()
                .and_then(|l| l.training.as_ref())
                .map(|t| t.last_checkpoint());
            let policy_path = ctx.operator.ask(
                "Policy path (Hugging Face repo id or local checkpoint)",
                last_checkpoint.as_deref(),
            );
            if policy_path.trim().is_empty() {
                println!("{}", "A policy is required for inference.".red());
                return Ok(());
            }
            let task = ctx
                .operator
                .ask("Task description", Some("Pick up the object and place it in the box"));
            let episode_time_s = ask_parsed(&mut *ctx.operator, "Run duration (seconds)", 60u32);
            let user = ctx.accounts.hf_whoami().await.unwrap_or_else(|| "local".to_string());
            let policy_name = policy_path
                .trim_end_matches('/')
                .split('/')
                .filter(|part| !matches!(*part, "pretrained_model" | "last" | "checkpoints"))
                .next_back()
                .unwrap_or("policy")
                .to_string();
            let default_eval = format!("{user}/eval_{policy_name}");
            let eval_repo_id = ctx
                .operator
                .ask("Evaluation dataset repository id", Some(&default_eval));
            InferenceSettings {
                policy_path,
                task,
                episode_time_s,
                eval_repo_id,
                cameras: ask_cameras(ctx).await,
            }
        }
    };

    let follower = arms.kind.device_pair(&arms.leader_port, &arms.follower_port).1;
    let request = InferenceRequest {
        follower,
        settings: settings.clone(),
    };
    println!("\nRunning policy {} on the follower arm", settings.policy_path);
    println!("Press Ctrl+C to stop.");
    match ctx.framework.infer(&request).await {
        Ok(()) | Err(FrameworkError::Interrupted(_)) => {
            println!("{}", "Inference finished.".green());
            config.lerobot_mut().inference = Some(settings);
            ctx.store.save(config)?;
        }
        Err(e) => println!("{}", format!("Inference failed: {e}").red()),
    }
    Ok(())
}

/// Run a teleoperation session. A Ctrl-C stop counts as success.
pub async fn teleoperation(ctx: &mut RoboContext<'_>, arms: &CalibratedArms, cameras: &CameraSetup) -> bool {
    let (leader, follower) = arms.kind.device_pair(&arms.leader_port, &arms.follower_port);
    println!("\nStarting teleoperation...");
    println!("Leader arm port: {}", arms.leader_port);
    println!("Follower arm port: {}", arms.follower_port);
    println!("Move the leader arm to control the follower arm. Press Ctrl+C to stop.");
    let request = TeleopRequest {
        leader,
        follower,
        cameras: cameras.clone(),
        fps: TELEOP_FPS,
        display_data: true,
    };
    match ctx.framework.teleoperate(&request).await {
        Ok(()) => true,
        Err(FrameworkError::Interrupted(_)) => {
            println!("\nTeleoperation stopped by user.");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "teleoperation failed");
            println!("{}", format!("Teleoperation failed: {e}").red());
            false
        }
    }
}

fn require_calibrated(config: &SessionConfig) -> Option<CalibratedArms> {
    match config.lerobot.as_ref().and_then(|l| l.calibrated_arms()) {
        Some(arms) => {
            display_arms_status(arms.kind, &arms.leader_port, &arms.follower_port);
            Some(arms)
        }
        None => {
            display_calibration_error();
            None
        }
    }
}

/// Offer previously saved settings for `label`.
fn reuse_saved<T: std::fmt::Debug>(operator: &mut dyn Operator, label: &str, saved: Option<T>) -> Option<T> {
    let saved = saved?;
    println!("\nFound saved {label} settings.");
    tracing::debug!(?saved, "saved mode settings");
    if operator.confirm(&format!("Use the saved {label} settings?"), true) {
        Some(saved)
    } else {
        None
    }
}

async fn ask_cameras(ctx: &mut RoboContext<'_>) -> CameraSetup {
    if ctx.operator.confirm("Would you like to setup cameras?", true) {
        setup_cameras(ctx.cameras, &mut *ctx.operator).await
    } else {
        CameraSetup::disabled()
    }
}

/// The logged-in Hugging Face user, offering an interactive login when needed.
async fn ensure_hf_login(ctx: &mut RoboContext<'_>) -> Option<String> {
    if let Some(user) = ctx.accounts.hf_whoami().await {
        println!("Logged in to Hugging Face as {user}");
        return Some(user);
    }
    println!("{}", "You are not logged in to Hugging Face.".yellow());
    if !ctx.operator.confirm("Log in now?", true) {
        return None;
    }
    if !ctx.accounts.hf_login().await {
        return None;
    }
    ctx.accounts.hf_whoami().await
}
