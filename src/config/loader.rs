use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::types::Config;

pub const CONFIG_FILE: &str = ".docker-unit.yml";

/// Load config from an explicit file, or from `.docker-unit.yml` in `dir`.
///
/// A missing default file yields `Config::default()`; a missing explicit file is an error.
pub fn load(dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    let path: PathBuf = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = dir.join(CONFIG_FILE);
            if !p.exists() {
                debug!("no {CONFIG_FILE} in {}, using defaults", dir.display());
                return Ok(Config::default());
            }
            p
        }
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}
