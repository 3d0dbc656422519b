//! Hardware probing and the server recommendation derived from it.

use std::fmt;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::{internal::server::ServerType, utils::process::ExternalCommand};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    #[serde(rename = "NVIDIA")]
    Nvidia,
    #[serde(rename = "AMD")]
    Amd,
    #[serde(rename = "Intel")]
    Intel,
    #[serde(rename = "Apple Silicon")]
    Apple,
    #[serde(rename = "Unknown")]
    Unknown,
    #[default]
    #[serde(rename = "None")]
    None,
}

impl GpuVendor {
    /// Classify a GPU by its marketing name.
    pub fn from_model(model: &str) -> Self {
        if model.contains("NVIDIA") {
            GpuVendor::Nvidia
        } else if model.contains("AMD") || model.contains("Radeon") {
            GpuVendor::Amd
        } else if model.contains("Intel") {
            GpuVendor::Intel
        } else if model.contains("Apple") {
            GpuVendor::Apple
        } else {
            GpuVendor::Unknown
        }
    }

    pub fn compute_backend(&self) -> ComputeBackend {
        match self {
            GpuVendor::Nvidia => ComputeBackend::Cuda,
            GpuVendor::Amd => ComputeBackend::Hip,
            GpuVendor::Intel => ComputeBackend::OpenCl,
            GpuVendor::Apple => ComputeBackend::Metal,
            GpuVendor::Unknown | GpuVendor::None => ComputeBackend::Cpu,
        }
    }
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuVendor::Nvidia => "NVIDIA",
            GpuVendor::Amd => "AMD",
            GpuVendor::Intel => "Intel",
            GpuVendor::Apple => "Apple Silicon",
            GpuVendor::Unknown => "Unknown",
            GpuVendor::None => "None",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeBackend {
    #[serde(rename = "CUDA")]
    Cuda,
    #[serde(rename = "HIP")]
    Hip,
    #[serde(rename = "OpenCL")]
    OpenCl,
    #[serde(rename = "Metal")]
    Metal,
    #[default]
    #[serde(rename = "CPU")]
    Cpu,
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComputeBackend::Cuda => "CUDA",
            ComputeBackend::Hip => "HIP",
            ComputeBackend::OpenCl => "OpenCL",
            ComputeBackend::Metal => "Metal",
            ComputeBackend::Cpu => "CPU",
        };
        f.write_str(name)
    }
}

/// Cached in the session config under `system_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_gb: f64,
    #[serde(default)]
    pub gpu_vendor: GpuVendor,
    #[serde(default)]
    pub gpu_model: Option<String>,
    #[serde(default)]
    pub gpu_memory_gb: f64,
    #[serde(default)]
    pub compute_backend: ComputeBackend,
}

impl SystemInfo {
    pub fn has_gpu(&self) -> bool {
        !matches!(self.gpu_vendor, GpuVendor::None | GpuVendor::Unknown)
    }

    /// Device string PyTorch-based tools expect.
    pub fn torch_device(&self) -> &'static str {
        match self.compute_backend {
            ComputeBackend::Cuda | ComputeBackend::Hip => "cuda",
            ComputeBackend::Metal => "mps",
            _ => "cpu",
        }
    }

    pub fn print(&self) {
        println!("{}", "System Information".cyan().bold());
        println!("  {} {}", "Operating System:".bold(), self.os);
        println!("  {} {}", "CPU:".bold(), self.cpu_model);
        println!("  {} {}", "CPU Cores:".bold(), self.cpu_cores);
        println!("  {} {:.2}GB", "Memory:".bold(), self.memory_gb);
        println!("  {} {}", "GPU:".bold(), self.gpu_vendor);
        println!(
            "  {} {}",
            "GPU Model:".bold(),
            self.gpu_model.as_deref().unwrap_or("None")
        );
        println!("  {} {:.2}GB", "GPU Memory:".bold(), self.gpu_memory_gb);
        println!("  {} {}", "Compute Backend:".bold(), self.compute_backend);
        println!(
            "  {} {}",
            "Category:".bold(),
            hardware_category(self.memory_gb)
        );
    }
}

/// First GPU reported by `nvidia-smi`: model name and memory in GiB.
async fn probe_nvidia() -> Option<(String, f64)> {
    let out = ExternalCommand::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .await
        .ok()?;
    if !out.success() {
        return None;
    }
    parse_nvidia_smi(&out.stdout)
}

pub fn parse_nvidia_smi(stdout: &str) -> Option<(String, f64)> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (name, memory_mib) = line.rsplit_once(',')?;
    let memory_mib: f64 = memory_mib.trim().parse().ok()?;
    let mut name = name.trim().to_string();
    if !name.contains("NVIDIA") {
        name = format!("NVIDIA {name}");
    }
    Some((name, (memory_mib / 1024.0 * 100.0).round() / 100.0))
}

/// CUDA compute capability of the first GPU, e.g. `8.6`.
pub async fn nvidia_compute_capability() -> Option<f64> {
    let out = ExternalCommand::new("nvidia-smi")
        .args(["--query-gpu=compute_cap", "--format=csv,noheader"])
        .output()
        .await
        .ok()?;
    out.stdout.lines().next()?.trim().parse().ok()
}

pub async fn detect_hardware() -> SystemInfo {
    let sys = System::new_all();
    let cpu_model = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());
    let memory_gb = (sys.total_memory() as f64 / (1024.0_f64.powi(3)) * 100.0).round() / 100.0;

    let (gpu_vendor, gpu_model, gpu_memory_gb) = match probe_nvidia().await {
        Some((model, memory)) => (GpuVendor::from_model(&model), Some(model), memory),
        None if cfg!(all(target_os = "macos", target_arch = "aarch64")) => {
            // Unified memory: the GPU can address all of it.
            (GpuVendor::Apple, Some(cpu_model.clone()), memory_gb)
        }
        None => (GpuVendor::None, None, 0.0),
    };

    let info = SystemInfo {
        os: std::env::consts::OS.to_string(),
        cpu_model,
        cpu_cores: sys.cpus().len(),
        memory_gb,
        gpu_vendor,
        gpu_model,
        gpu_memory_gb,
        compute_backend: gpu_vendor.compute_backend(),
    };
    tracing::debug!(?info, "hardware detected");
    info
}

pub fn recommended_server(info: &SystemInfo) -> ServerType {
    let vendor = info.gpu_vendor;
    if matches!(vendor, GpuVendor::Nvidia | GpuVendor::Amd | GpuVendor::Intel)
        && info.gpu_memory_gb >= 8.0
        && info.memory_gb >= 16.0
    {
        ServerType::Vllm
    } else if (matches!(vendor, GpuVendor::Nvidia | GpuVendor::Amd) && info.gpu_memory_gb >= 6.0)
        || info.memory_gb >= 16.0
    {
        ServerType::Ollama
    } else {
        ServerType::LlamaCpp
    }
}

pub fn hardware_category(memory_gb: f64) -> &'static str {
    if memory_gb < 8.0 {
        "Fresh Adopter"
    } else if memory_gb < 16.0 {
        "Mid Range"
    } else if memory_gb < 32.0 {
        "High Performance"
    } else {
        "Maestro"
    }
}
