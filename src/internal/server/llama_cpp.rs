//! llama.cpp runs on the host through the `llama-cpp-python` server package.

use colored::Colorize;

use crate::{
    internal::{
        hardware::{GpuVendor, SystemInfo},
        hub,
    },
    utils::{
        operator::Operator,
        process::{ExternalCommand, ProcessError, on_path},
    },
};

pub const PACKAGE: &str = "llama-cpp-python[server]";
pub const DEFAULT_QUANT_PATTERN: &str = "*q4_0.gguf";

/// Python interpreter used for the install and the server.
pub fn python() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

pub async fn is_installed() -> bool {
    ExternalCommand::new(python())
        .args(["-c", "import llama_cpp"])
        .output()
        .await
        .is_ok_and(|out| out.success())
}

/// Build flags for the GPU `llama-cpp-python` is compiled against.
pub fn cmake_args(info: &SystemInfo, use_gpu: bool) -> &'static str {
    if !use_gpu {
        return "";
    }
    match info.gpu_vendor {
        GpuVendor::Nvidia => "-DGGML_CUDA=on",
        GpuVendor::Amd => "-DGGML_HIPBLAS=on",
        GpuVendor::Apple => "-DGGML_METAL=on",
        _ => "",
    }
}

pub fn install_command(use_uv: bool, cmake_args: &str) -> ExternalCommand {
    let command = if use_uv {
        ExternalCommand::new("uv").args(["pip", "install", "--no-cache-dir", PACKAGE])
    } else {
        ExternalCommand::new(python()).args(["-m", "pip", "install", "--no-cache-dir", PACKAGE])
    };
    command.env("CMAKE_ARGS", cmake_args)
}

/// Install the server package, preferring `uv` when the operator is working in a
/// uv-managed environment.
pub async fn install(
    info: &SystemInfo,
    use_gpu: bool,
    operator: &mut dyn Operator,
) -> Result<(), ProcessError> {
    if use_gpu && info.gpu_vendor == GpuVendor::Nvidia && !on_path("nvcc") {
        println!(
            "{}",
            "NVIDIA CUDA Toolkit was not found; the build may fall back to CPU.".yellow()
        );
        println!("Install it from https://developer.nvidia.com/cuda-downloads");
    }
    let use_uv = on_path("uv")
        && operator.confirm(
            "uv is available. Are you using (uv's) virtual env for installation?",
            true,
        );
    println!("Installing llama.cpp server...");
    let command = install_command(use_uv, cmake_args(info, use_gpu));
    match command.interactive().await? {
        0 => Ok(()),
        code => Err(ProcessError::Io {
            program: command.program().to_string(),
            source: std::io::Error::other(format!("installer exited with code {code}")),
        }),
    }
}

/// Split a model reference into `(repo_id, file_pattern)`.
///
/// `owner/repo/file.gguf` names one file; anything else is a repo id and gets the
/// default quantization pattern. A bare `file.gguf` has no repo.
pub fn preprocess_model_path(model: &str) -> (Option<String>, String) {
    if model.ends_with(".gguf") {
        match model.rsplit_once('/') {
            Some((repo, file)) => (Some(repo.to_string()), file.to_string()),
            None => (None, model.to_string()),
        }
    } else {
        (Some(model.to_string()), DEFAULT_QUANT_PATTERN.to_string())
    }
}

pub fn server_command(repo_id: Option<&str>, model: &str, port: u16) -> ExternalCommand {
    let mut command = ExternalCommand::new(python()).args(["-m", "llama_cpp.server"]);
    if let Some(repo) = repo_id {
        command = command.arg("--hf_model_repo_id").arg(repo);
    }
    command
        .arg("--model")
        .arg(model)
        .arg("--port")
        .arg(port.to_string())
}

/// Resolve the model file to serve, asking the operator when the repo holds several.
pub async fn choose_model(
    model: &str,
    token: Option<&str>,
    operator: &mut dyn Operator,
) -> Option<(Option<String>, String)> {
    let (repo, pattern) = preprocess_model_path(model);
    let Some(repo) = repo else {
        return Some((None, pattern));
    };
    if pattern != DEFAULT_QUANT_PATTERN {
        return Some((Some(repo), pattern));
    }

    let files = match hub::list_repo_files(&repo, &[".gguf"], token).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(repo = %repo, error = %e, "could not list repo files");
            return Some((Some(repo), pattern));
        }
    };
    match files.len() {
        0 => {
            println!("No gguf models found in the repo. Please try another repository.");
            None
        }
        1 => files.into_iter().next().map(|f| (Some(repo), f)),
        _ => {
            println!("\nAvailable models:");
            let index = operator.choose("Choose model number", &files, 0);
            files.into_iter().nth(index).map(|f| (Some(repo), f))
        }
    }
}

/// Run the server in the foreground until it exits or Ctrl-C.
pub async fn serve(repo_id: Option<&str>, model: &str, port: u16) -> Result<i32, ProcessError> {
    match repo_id {
        Some(repo) => println!("Using model: {repo}/{model}"),
        None => println!("Using model: {model}"),
    }
    println!("{}", format!("Starting llama.cpp server on port {port}...").bright_cyan());
    server_command(repo_id, model, port).interactive().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_model_path() {
        assert_eq!(
            preprocess_model_path("bartowski/Llama-3.2-1B-Instruct-GGUF"),
            (
                Some("bartowski/Llama-3.2-1B-Instruct-GGUF".to_string()),
                "*q4_0.gguf".to_string()
            )
        );
        assert_eq!(
            preprocess_model_path("owner/repo/model-Q8_0.gguf"),
            (Some("owner/repo".to_string()), "model-Q8_0.gguf".to_string())
        );
        assert_eq!(preprocess_model_path("local.gguf"), (None, "local.gguf".to_string()));
    }

    #[test]
    fn test_cmake_args_follow_gpu() {
        let mut info = SystemInfo {
            gpu_vendor: GpuVendor::Apple,
            ..Default::default()
        };
        assert_eq!(cmake_args(&info, true), "-DGGML_METAL=on");
        assert_eq!(cmake_args(&info, false), "");
        info.gpu_vendor = GpuVendor::Amd;
        assert_eq!(cmake_args(&info, true), "-DGGML_HIPBLAS=on");
    }

    #[test]
    fn test_install_and_server_commands() {
        let uv = install_command(true, "-DGGML_CUDA=on");
        assert_eq!(uv.program(), "uv");
        assert_eq!(uv.get_envs(), [("CMAKE_ARGS".to_string(), "-DGGML_CUDA=on".to_string())]);

        let server = server_command(Some("owner/repo"), "m.gguf", 8080);
        assert_eq!(
            server.get_args(),
            ["-m", "llama_cpp.server", "--hf_model_repo_id", "owner/repo", "--model", "m.gguf", "--port", "8080"]
        );
    }

    #[tokio::test]
    async fn test_explicit_file_skips_hub_lookup() {
        let mut operator = crate::utils::operator::ScriptedOperator::default();
        let chosen = choose_model("owner/repo/x.gguf", None, &mut operator).await;
        assert_eq!(chosen, Some((Some("owner/repo".to_string()), "x.gguf".to_string())));
        assert!(operator.transcript.is_empty());
    }
}
