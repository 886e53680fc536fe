pub mod model;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use model::{
    BotConfig, LinksConfig, ReconnectConfig, ReputationConfig, SeenConfig, ServerConfig,
    TimeoutConfig, WarnConfig,
};

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modbot")
        .join("config.toml")
}

/// Load the configuration.
///
/// An explicit path must exist; the default path falls back to built-in
/// defaults when absent so the bot can run against a local server out of the
/// box.
pub fn load(path: Option<&Path>) -> Result<BotConfig> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (config_path(), false),
    };
    if !path.exists() {
        if required {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        return Ok(BotConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: BotConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config file")?;
    Ok(config)
}
