use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;

use crate::{error::SoloError, utils::path};

#[derive(Parser, Debug, Default)]
pub struct ListArgs {
    /// Directory where models are downloaded
    #[clap(long = "download-dir")]
    pub download_dir: Option<PathBuf>,
}

/// Entries of `dir`, sorted. `None` when the directory does not exist.
pub fn downloaded_models(dir: &Path) -> std::io::Result<Option<Vec<String>>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut models = Vec::new();
    for entry in entries {
        models.push(entry?.file_name().to_string_lossy().into_owned());
    }
    models.sort();
    Ok(Some(models))
}

pub async fn execute(args: ListArgs) -> Result<(), SoloError> {
    let dir = args.download_dir.unwrap_or_else(path::download_dir);
    println!("{}", "Downloaded Models:".cyan().bold());
    match downloaded_models(&dir)? {
        None => println!("{}", "No downloaded models directory found.".red().bold()),
        Some(models) if models.is_empty() => println!("{}", "No downloaded models found.".yellow()),
        Some(models) => {
            for model in models {
                println!(" - {model}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_downloaded_models_sorted() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b--model")).unwrap();
        std::fs::create_dir(dir.path().join("a--model")).unwrap();
        assert_eq!(
            downloaded_models(dir.path()).unwrap(),
            Some(vec!["a--model".to_string(), "b--model".to_string()])
        );
        assert_eq!(downloaded_models(&dir.path().join("missing")).unwrap(), None);
    }
}
