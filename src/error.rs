//! Top-level error returned by [`crate::cli::parse`].

use thiserror::Error;

use crate::{
    internal::{
        config::ConfigError,
        robot::framework::FrameworkError,
        server::{client::QueryError, docker::DockerError},
    },
    utils::process::ProcessError,
};

#[derive(Debug, Error)]
pub enum SoloError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Framework(#[from] FrameworkError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidArgument(String),

    /// Leave with this exit code; the reason was already shown to the operator.
    #[error("exit code {0}")]
    Exit(i32),
}

impl SoloError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SoloError::Exit(code) => *code,
            SoloError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
