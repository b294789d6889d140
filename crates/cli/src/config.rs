use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use lrfmp_core::Config;

/// Resolve config: defaults, then the optional TOML file, then environment.
///
/// An explicitly named file that does not exist is an error.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            debug!(config_path = %path.display(), "Loading config");
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            Config::from_toml_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => Config::default(),
    };
    config
        .apply_env()
        .context("invalid configuration in environment")?;
    Ok(config)
}
