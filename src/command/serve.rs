use clap::Parser;
use colored::Colorize;

use crate::{
    error::SoloError,
    internal::{
        config::{ConfigStore, JsonFileStore, SessionConfig},
        hardware::{GpuVendor, SystemInfo, nvidia_compute_capability, recommended_server},
        hub,
        robot::ports::{PortScanner, SystemPortScanner},
        server::{
            ServerType,
            docker::Docker,
            launch::{ServerLaunch, image_for, setup_docker_server},
            llama_cpp,
        },
    },
    utils::{
        operator::{ConsoleOperator, Operator},
        process::ProcessError,
    },
};

use super::setup::system_info;

#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Server to start; defaults to the configured one
    #[clap(short = 's', long = "server", value_enum)]
    pub server: Option<ServerType>,

    /// Model to serve (repo id, Ollama tag or GGUF path)
    #[clap(short = 'm', long)]
    pub model: Option<String>,

    /// Host port to expose the server on
    #[clap(short = 'p', long)]
    pub port: Option<u16>,

    /// Run on the CPU even if a GPU was detected
    #[clap(long)]
    pub cpu: bool,
}

pub async fn execute(args: ServeArgs) -> Result<(), SoloError> {
    let store = JsonFileStore::from_env()?;
    let mut config = store.load_or_default();
    let mut operator = ConsoleOperator;

    let info = system_info(&mut config, false).await;
    let server = args
        .server
        .or_else(|| config.server_type())
        .unwrap_or_else(|| recommended_server(&info));
    let port = args.port.unwrap_or(server.default_port());
    let use_gpu = !args.cpu && info.has_gpu();
    tracing::info!(server = %server, port, use_gpu, "serving");

    let model = match server {
        ServerType::LlamaCpp => {
            return serve_llama_cpp(&store, &mut config, &info, &args, port, use_gpu, &mut operator).await;
        }
        _ => serve_docker(&store, &mut config, &info, &args, server, port, use_gpu, &mut operator).await?,
    };

    record_server(&store, &mut config, server, port, &model)?;
    println!(
        "{} is available at {}",
        server.label().bold(),
        server.base_url(port).cyan()
    );
    Ok(())
}

fn record_server(
    store: &dyn ConfigStore,
    config: &mut SessionConfig,
    server: ServerType,
    port: u16,
    model: &str,
) -> Result<(), SoloError> {
    let section = config.server_mut();
    section.server_type = Some(server.as_str().to_string());
    section.port = Some(port);
    section.model = Some(model.to_string());
    store.save(config)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn serve_docker(
    store: &dyn ConfigStore,
    config: &mut SessionConfig,
    info: &SystemInfo,
    args: &ServeArgs,
    server: ServerType,
    port: u16,
    use_gpu: bool,
    operator: &mut dyn Operator,
) -> Result<String, SoloError> {
    let Some(image) = image_for(server, info, use_gpu) else {
        println!("{}", format!("{} does not support this machine yet.", server.label()).red());
        return Err(SoloError::Exit(1));
    };

    let mut launch = ServerLaunch::new(server, image, port);
    if use_gpu && matches!(info.gpu_vendor, GpuVendor::Nvidia | GpuVendor::Amd) {
        launch.gpu = info.gpu_vendor;
    }
    if launch.gpu == GpuVendor::Nvidia {
        launch.compute_capability = nvidia_compute_capability().await;
    }

    let model = match server {
        ServerType::Vllm => {
            launch.hf_token = hub::resolve_or_prompt_token(store, config, operator)?;
            Some(ask_model(args, server, operator))
        }
        ServerType::Lerobot => {
            launch.hf_token = hub::resolve_token(config);
            launch.devices = passthrough_devices(&SystemPortScanner::default());
            Some(ask_model(args, server, operator))
        }
        _ => None,
    };
    launch.model = model.clone();

    setup_docker_server(&Docker::default(), &launch, operator).await?;

    match model {
        Some(model) => Ok(model),
        None => {
            let model = ask_model(args, server, operator);
            pull_ollama_model(launch.container_name(), &model).await?;
            Ok(model)
        }
    }
}

fn ask_model(args: &ServeArgs, server: ServerType, operator: &mut dyn Operator) -> String {
    match &args.model {
        Some(model) => model.clone(),
        None => operator.ask("Enter the model name", Some(server.default_model())),
    }
}

/// Serial ports and video devices a LeRobot container needs.
fn passthrough_devices(scanner: &dyn PortScanner) -> Vec<String> {
    let mut devices: Vec<String> = scanner
        .available_ports()
        .into_iter()
        .filter(|p| p.contains("ttyUSB") || p.contains("ttyACM"))
        .collect();
    if let Ok(entries) = std::fs::read_dir("/dev") {
        let mut videos: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("video"))
            .map(|e| e.path().to_string_lossy().into_owned())
            .collect();
        videos.sort();
        devices.extend(videos);
    }
    devices
}

async fn pull_ollama_model(container: &str, model: &str) -> Result<(), SoloError> {
    println!("Pulling {model} into {container}...");
    let code = Docker::default()
        .exec_interactive(container, &["ollama", "pull", model])
        .await?;
    if code != 0 {
        println!("{}", format!("Failed to pull {model} (exit code {code})").red());
        return Err(SoloError::Exit(1));
    }
    Ok(())
}

async fn serve_llama_cpp(
    store: &dyn ConfigStore,
    config: &mut SessionConfig,
    info: &SystemInfo,
    args: &ServeArgs,
    port: u16,
    use_gpu: bool,
    operator: &mut dyn Operator,
) -> Result<(), SoloError> {
    if llama_cpp::is_installed().await {
        println!("{}", "llama.cpp server is already installed".green());
    } else {
        llama_cpp::install(info, use_gpu, operator).await?;
    }

    let token = hub::resolve_or_prompt_token(store, config, operator)?;
    if args.model.is_none() {
        println!(
            "\nPlease add repo_id from HuggingFace Hub (e.g., {})",
            ServerType::LlamaCpp.default_model()
        );
    }
    let model = ask_model(args, ServerType::LlamaCpp, operator);
    let Some((repo, file)) = llama_cpp::choose_model(&model, token.as_deref(), operator).await else {
        return Err(SoloError::Exit(1));
    };

    record_server(store, config, ServerType::LlamaCpp, port, &model)?;
    match llama_cpp::serve(repo.as_deref(), &file, port).await {
        Ok(0) | Err(ProcessError::Interrupted(_)) => {
            println!("llama.cpp server stopped.");
            Ok(())
        }
        Ok(code) => {
            println!("{}", format!("llama.cpp server exited with code {code}").red());
            Err(SoloError::Exit(1))
        }
        Err(e) => Err(e.into()),
    }
}
