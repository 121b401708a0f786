// src/config/loader.rs

use std::fs;
use std::io;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevpipeError, Result};

/// Name of the config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Devpipe.toml";

/// Read and deserialize a config file without semantic validation.
///
/// Use [`load_and_validate`] to also check the task graph, actions and watch
/// rules.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            DevpipeError::ConfigError(format!("config file {} not found", path.display()))
        }
        _ => DevpipeError::IoError(e),
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Parse and validate a config held in memory.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// Load a config file and validate it. Defaults come from `serde`; the task
/// graph must be acyclic and every reference must resolve.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
