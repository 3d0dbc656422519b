use clap::{Parser, ValueEnum};

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore},
        hub::CliAccounts,
        robot::{
            RoboContext,
            cameras::default_probes,
            framework::LerobotCli,
            modes::{self, Mode},
            ports::{DEFAULT_SETTLE, SystemPortScanner},
        },
    },
    utils::operator::ConsoleOperator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoboticsType {
    Lerobot,
}

#[derive(Parser, Debug)]
pub struct RoboArgs {
    /// Robotics framework to use
    #[clap(long = "type", value_enum, default_value = "lerobot")]
    pub robo_type: RoboticsType,

    /// Setup motors and calibrate robot arms
    #[clap(long)]
    pub calibrate: bool,

    /// Start teleoperation (requires calibrated arms)
    #[clap(long)]
    pub teleop: bool,

    /// Record data for training (requires calibrated arms)
    #[clap(long)]
    pub record: bool,

    /// Train a policy on recorded data
    #[clap(long)]
    pub train: bool,

    /// Run a trained policy on the follower arm
    #[clap(long)]
    pub inference: bool,
}

impl RoboArgs {
    pub fn mode(&self) -> Mode {
        Mode::from_flags(
            self.calibrate,
            self.teleop,
            self.record,
            self.train,
            self.inference,
        )
    }
}

pub async fn execute(args: RoboArgs) -> Result<(), SoloError> {
    let RoboticsType::Lerobot = args.robo_type;
    let store = JsonFileStore::from_env()?;
    let mut config = store.load_or_default();

    let framework = LerobotCli;
    let scanner = SystemPortScanner::default();
    let probes = default_probes();
    let accounts = CliAccounts;
    let mut operator = ConsoleOperator;

    let mut ctx = RoboContext {
        store: &store,
        framework: &framework,
        scanner: &scanner,
        cameras: &probes,
        accounts: &accounts,
        operator: &mut operator,
        settle: DEFAULT_SETTLE,
    };
    modes::run(args.mode(), &mut ctx, &mut config).await?;
    Ok(())
}
