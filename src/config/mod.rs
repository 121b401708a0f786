// src/config/mod.rs

//! Configuration loading and validation for devpipe.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ConfigSection, PipelineConfig, RawConfigFile, ServerConfig, StageConfig,
    StageKind, TaskConfig, WatchRuleConfig,
};
