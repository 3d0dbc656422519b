//! Bringing up a Docker-hosted model server.

use std::time::{Duration, Instant};

use colored::Colorize;
use indicatif::ProgressBar;

use crate::{
    internal::{
        hardware::{GpuVendor, SystemInfo},
        server::{
            ServerType,
            docker::{Docker, DockerError},
        },
    },
    utils::operator::Operator,
};

pub const READY_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_TAIL: usize = 50;

/// Image to run `server` on this machine, or `None` when the combination is
/// unsupported.
pub fn image_for(server: ServerType, info: &SystemInfo, use_gpu: bool) -> Option<&'static str> {
    let vendor = if use_gpu { info.gpu_vendor } else { GpuVendor::None };
    let cpu = info.cpu_model.split_whitespace().next().unwrap_or_default();
    match server {
        ServerType::Vllm => match vendor {
            GpuVendor::Nvidia => Some("vllm/vllm-openai:latest"),
            GpuVendor::Amd => Some("rocm/vllm"),
            _ if cpu == "Apple" => Some("getsolo/vllm-arm"),
            _ if matches!(cpu, "Intel" | "AMD") => Some("getsolo/vllm-cpu"),
            _ => None,
        },
        ServerType::Ollama => match vendor {
            GpuVendor::Amd => Some("ollama/ollama:rocm"),
            _ => Some("ollama/ollama"),
        },
        ServerType::Lerobot => Some(match vendor {
            GpuVendor::Nvidia => "getsolo/lerobot:nvidia",
            GpuVendor::Amd => "getsolo/lerobot:amd",
            GpuVendor::Apple => "getsolo/lerobot:apple",
            _ => "getsolo/lerobot:cpu",
        }),
        ServerType::LlamaCpp => None,
    }
}

/// Everything needed to `docker run` one server.
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    pub server: ServerType,
    pub image: String,
    pub port: u16,
    pub model: Option<String>,
    pub hf_token: Option<String>,
    /// Vendor whose GPU flags are added; [`GpuVendor::None`] for CPU-only.
    pub gpu: GpuVendor,
    /// CUDA compute capability, used to pick vLLM's dtype.
    pub compute_capability: Option<f64>,
    /// Host devices passed through to the container (serial ports, cameras).
    pub devices: Vec<String>,
    pub hf_cache: Option<String>,
}

impl ServerLaunch {
    pub fn new(server: ServerType, image: impl Into<String>, port: u16) -> Self {
        Self {
            server,
            image: image.into(),
            port,
            model: None,
            hf_token: None,
            gpu: GpuVendor::None,
            compute_capability: None,
            devices: Vec::new(),
            hf_cache: dirs::home_dir()
                .map(|home| home.join(".cache").join("huggingface").display().to_string()),
        }
    }

    pub fn container_name(&self) -> &'static str {
        self.server.container_name().unwrap_or("solo-server")
    }

    /// Readiness probe run inside the container.
    pub fn probe(&self) -> &'static [&'static str] {
        match self.server {
            ServerType::Ollama => &["ollama", "list"],
            _ => &["ps", "aux"],
        }
    }

    /// Arguments following `docker run -d`.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["--name".into(), self.container_name().into()];
        let container_port = self.server.container_port();

        match self.server {
            ServerType::Vllm => {
                if let Some(cache) = &self.hf_cache {
                    args.push("-v".into());
                    args.push(format!("{cache}:/root/.cache/huggingface"));
                }
                args.push("--env".into());
                args.push(format!(
                    "HUGGING_FACE_HUB_TOKEN={}",
                    self.hf_token.as_deref().unwrap_or_default()
                ));
                args.push("-p".into());
                args.push(format!("{}:{container_port}", self.port));
                args.push("--ipc=host".into());
            }
            ServerType::Ollama => {
                args.extend(["-v".into(), "ollama:/root/.ollama".into()]);
                args.push("-p".into());
                args.push(format!("{}:{container_port}", self.port));
            }
            ServerType::Lerobot => {
                args.push("-p".into());
                args.push(format!("{}:{container_port}", self.port));
                args.push("--env".into());
                args.push(format!(
                    "MODEL_ID={}",
                    self.model.as_deref().unwrap_or(self.server.default_model())
                ));
                if let Some(token) = &self.hf_token {
                    args.push("--env".into());
                    args.push(format!("HUGGING_FACE_HUB_TOKEN={token}"));
                }
                for device in &self.devices {
                    args.push("--device".into());
                    args.push(device.clone());
                }
            }
            ServerType::LlamaCpp => {}
        }

        match self.gpu {
            GpuVendor::Nvidia => args.extend(["--gpus".into(), "all".into()]),
            GpuVendor::Amd if self.server == ServerType::Vllm => args.extend(
                [
                    "--network=host",
                    "--group-add=video",
                    "--cap-add=SYS_PTRACE",
                    "--security-opt",
                    "seccomp=unconfined",
                    "--device",
                    "/dev/kfd",
                    "--device",
                    "/dev/dri",
                ]
                .map(String::from),
            ),
            GpuVendor::Amd => {
                args.extend(["--device", "/dev/kfd", "--device", "/dev/dri"].map(String::from))
            }
            _ => {}
        }

        args.push(self.image.clone());

        if self.server == ServerType::Vllm {
            let model = self.model.as_deref().unwrap_or(self.server.default_model());
            args.extend(["--model".into(), model.into(), "--max_model_len=4096".into()]);
            if self.gpu == GpuVendor::Nvidia {
                args.push("--gpu_memory_utilization=0.95".into());
                if self.compute_capability.is_some_and(|cap| cap > 5.0 && cap < 8.0) {
                    args.push("--dtype=half".into());
                }
            }
        }
        args
    }
}

/// Whether nothing on this host listens on `port`.
pub async fn port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(("0.0.0.0", port)).await.is_ok()
}

/// Make sure the server's container is up and answering its readiness probe.
///
/// A running container is reused. A stopped one is either started again or, if the
/// operator wants a new model, removed and recreated from `launch`.
pub async fn setup_docker_server(
    docker: &Docker,
    launch: &ServerLaunch,
    operator: &mut dyn Operator,
) -> Result<(), DockerError> {
    docker.ensure_running().await?;
    let name = launch.container_name();
    let label = launch.server.label();

    if docker.container_exists(name).await? {
        if docker.container_running(name).await? {
            println!("{}", format!("{label} server is already set up!").green());
            return Ok(());
        }
        let recreate = operator.confirm(
            &format!("{label} server already exists. Do you want to run with a new model?"),
            false,
        );
        if recreate {
            docker.remove(name, false).await?;
        } else {
            docker.start(name).await?;
            return wait_until_ready(docker, launch, READY_TIMEOUT).await;
        }
    }

    if !port_available(launch.port).await {
        return Err(DockerError::PortInUse(launch.port));
    }

    println!("Pulling {}...", launch.image);
    docker.pull(&launch.image).await?;

    println!("Starting {label} server...");
    let id = docker.run_detached(&launch.docker_args()).await?;
    tracing::info!(container = name, id = %id, image = %launch.image, "container started");

    match docker.logs(name, LOG_TAIL).await {
        Ok(logs) => {
            if !logs.stderr.trim().is_empty() {
                eprintln!("{}\n{}", "Server logs:".yellow(), logs.stderr.trim_end());
            }
        }
        Err(e) => tracing::warn!(container = name, error = %e, "failed to fetch logs"),
    }

    let ready = wait_until_ready(docker, launch, READY_TIMEOUT).await;
    if ready.is_err() {
        // Leave nothing half-started behind.
        if let Err(e) = docker.stop(name).await {
            tracing::warn!(container = name, error = %e, "failed to stop container");
        }
    }
    ready
}

/// Poll the readiness probe once a second until it succeeds or `timeout` passes.
pub async fn wait_until_ready(
    docker: &Docker,
    launch: &ServerLaunch,
    timeout: Duration,
) -> Result<(), DockerError> {
    let name = launch.container_name();
    let bar = ProgressBar::new_spinner();
    bar.set_message(format!("Waiting for {} to become ready...", launch.server.label()));
    bar.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    while start.elapsed() < timeout {
        if docker.exec_ok(name, launch.probe()).await? {
            bar.finish_and_clear();
            println!(
                "{}",
                format!("{} server is ready!", launch.server.label())
                    .bright_cyan()
                    .bold()
            );
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    bar.finish_and_clear();
    Err(DockerError::Timeout(
        launch.server.label().to_string(),
        timeout.as_secs(),
    ))
}
