//! Model servers solo can run: three Docker-hosted ones and a pip-installed
//! llama.cpp server.

pub mod client;
pub mod docker;
pub mod launch;
pub mod llama_cpp;

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ServerType {
    #[serde(rename = "ollama")]
    #[value(name = "ollama")]
    Ollama,
    #[serde(rename = "vllm")]
    #[value(name = "vllm")]
    Vllm,
    #[serde(rename = "llama.cpp")]
    #[value(name = "llama.cpp", alias = "llamacpp")]
    LlamaCpp,
    #[serde(rename = "lerobot")]
    #[value(name = "lerobot")]
    Lerobot,
}

impl ServerType {
    pub const ALL: [ServerType; 4] = [
        ServerType::Ollama,
        ServerType::Vllm,
        ServerType::LlamaCpp,
        ServerType::Lerobot,
    ];

    /// Name stored in `server.type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Ollama => "ollama",
            ServerType::Vllm => "vllm",
            ServerType::LlamaCpp => "llama.cpp",
            ServerType::Lerobot => "lerobot",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServerType::Ollama => "Ollama",
            ServerType::Vllm => "vLLM",
            ServerType::LlamaCpp => "llama.cpp",
            ServerType::Lerobot => "LeRobot",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServerType::Ollama => 11434,
            ServerType::Vllm => 8000,
            ServerType::LlamaCpp => 8080,
            ServerType::Lerobot => 5070,
        }
    }

    /// `None` for llama.cpp, which runs on the host.
    pub fn container_name(&self) -> Option<&'static str> {
        match self {
            ServerType::Ollama => Some("solo-ollama"),
            ServerType::Vllm => Some("solo-vllm"),
            ServerType::Lerobot => Some("solo-lerobot"),
            ServerType::LlamaCpp => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ServerType::Ollama => "llama3.2",
            ServerType::Vllm => "meta-llama/Llama-3.2-1B-Instruct",
            ServerType::LlamaCpp => "bartowski/Llama-3.2-1B-Instruct-GGUF",
            ServerType::Lerobot => "lerobot/act_so101",
        }
    }

    /// Port the server listens on inside its container.
    pub fn container_port(&self) -> u16 {
        self.default_port()
    }

    pub fn base_url(&self, port: u16) -> String {
        format!("http://localhost:{port}")
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ServerType::Ollama),
            "vllm" => Ok(ServerType::Vllm),
            "llama.cpp" | "llamacpp" | "llama_cpp" => Ok(ServerType::LlamaCpp),
            "lerobot" => Ok(ServerType::Lerobot),
            other => Err(format!("unknown server type: {other}")),
        }
    }
}
