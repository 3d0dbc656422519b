use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore, SessionConfig},
        hardware::{SystemInfo, detect_hardware, recommended_server},
        robot::framework::INSTALL_HINT,
        server::ServerType,
    },
    utils::{
        operator::{ConsoleOperator, Operator},
        process::ExternalCommand,
    },
};

#[derive(Parser, Debug, Default)]
pub struct SetupArgs {
    /// Detect hardware again instead of using the cached result
    #[clap(long)]
    pub refresh: bool,

    /// Server to configure; asks when omitted
    #[clap(short = 's', long = "server", value_enum)]
    pub server: Option<ServerType>,
}

pub async fn execute(args: SetupArgs) -> Result<(), SoloError> {
    let store = JsonFileStore::from_env()?;
    let mut config = store.load_or_default();
    let mut operator = ConsoleOperator;

    let info = system_info(&mut config, args.refresh).await;
    info.print();

    let recommended = recommended_server(&info);
    println!(
        "\nRecommended server for this machine: {}",
        recommended.label().green().bold()
    );
    let server = match args.server {
        Some(server) => server,
        None => choose_server(&mut operator, recommended),
    };
    config.server_mut().server_type = Some(server.as_str().to_string());
    store.save(&config)?;
    println!("Selected {} as the active server.", server.label().bold());

    if server == ServerType::Lerobot {
        offer_lerobot_install(&mut operator).await?;
    } else {
        println!("Run `solo serve` to start it.");
    }
    Ok(())
}

/// Cached hardware info, or a fresh probe stored back into `config`.
pub async fn system_info(config: &mut SessionConfig, refresh: bool) -> SystemInfo {
    if !refresh {
        if let Some(info) = &config.system_info {
            return info.clone();
        }
    }
    let info = detect_hardware().await;
    config.system_info = Some(info.clone());
    info
}

pub fn choose_server(operator: &mut dyn Operator, recommended: ServerType) -> ServerType {
    let options: Vec<String> = ServerType::ALL.iter().map(|s| s.label().to_string()).collect();
    let default = ServerType::ALL
        .iter()
        .position(|s| *s == recommended)
        .unwrap_or(0);
    println!("\nSelect the server to use:");
    let index = operator.choose("Server", &options, default);
    ServerType::ALL[index.min(ServerType::ALL.len() - 1)]
}

async fn offer_lerobot_install(operator: &mut dyn Operator) -> Result<(), SoloError> {
    let installed = ExternalCommand::new("lerobot-calibrate")
        .arg("--help")
        .output()
        .await
        .is_ok_and(|out| out.success());
    if installed {
        println!("{}", "LeRobot is already installed.".green());
        return Ok(());
    }
    if !operator.confirm("LeRobot is not installed. Install it now with pip?", true) {
        println!("Install it later with `{INSTALL_HINT}`.");
        return Ok(());
    }
    let code = ExternalCommand::new("pip")
        .args(["install", "lerobot[feetech]"])
        .interactive()
        .await?;
    if code == 0 {
        println!("{}", "LeRobot installed. Run `solo robo --type lerobot` to set up your arms.".green());
    } else {
        println!("{}", format!("pip exited with code {code}").red());
    }
    Ok(())
}
