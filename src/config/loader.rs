// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

pub const DEFAULT_CONFIG_FILE: &str = "Simrunner.toml";

/// Read and deserialize a config file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&contents)?;
    debug!(
        path = %path.display(),
        runs = raw.run.len(),
        functions = raw.function.len(),
        "config file parsed"
    );
    Ok(raw)
}

/// Read a config file and run every validation step on it: node names,
/// `after` references, cycles, submitter sections and `[config]` values.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `Simrunner.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
