//! Path builders for solo's on-disk state: the config directory, the session file and
//! the default model download directory.

use std::path::PathBuf;

/// Overrides the config directory; used by tests and by multi-bench setups.
pub const CONFIG_DIR_ENV: &str = "SOLO_CONFIG_DIR";
pub const CONFIG_DIR_NAME: &str = ".solo_server";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloaded_models";

/// `$SOLO_CONFIG_DIR`, else `~/.solo_server`. `None` only when no home directory exists.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)),
    }
}

pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

/// Directory a Hugging Face repo is materialised into: `owner/name` becomes `owner--name`.
pub fn model_dir(download_dir: &std::path::Path, repo_id: &str) -> PathBuf {
    download_dir.join(repo_id.replace('/', "--"))
}
