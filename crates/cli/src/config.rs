use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use eventcast_stream::ServerOptions;
use serde::Deserialize;

/// On-disk configuration, `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerOptions,
}

/// `~/.config/eventcast/config.toml` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("eventcast").join("config.toml"))
}

/// Load server options from `explicit`, or from the default location if present.
pub fn load(explicit: Option<&Path>) -> Result<ServerOptions> {
    load_from(explicit, default_config_path())
}

fn load_from(explicit: Option<&Path>, fallback: Option<PathBuf>) -> Result<ServerOptions> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => match fallback {
            Some(path) if path.exists() => path,
            _ => return Ok(ServerOptions::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(file.server)
}

/// Load environment variables from a `.env` file in `dir`, if there is one.
pub fn load_env_file(dir: &Path) {
    let env_file_path = dir.join(".env");

    match dotenvy::from_path(&env_file_path) {
        Ok(_) => {
            eprintln!("✓ Loaded environment from {}", env_file_path.display());
        }
        Err(e) if e.not_found() => {}
        Err(e) => {
            eprintln!(
                "Warning: Failed to load .env file at {}: {}",
                env_file_path.display(),
                e
            );
        }
    }
}
