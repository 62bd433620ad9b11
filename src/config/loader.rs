// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

/// Load a configuration file and return the raw, unvalidated `RawConfigFile`.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load and validate a configuration file. This is the entry point the rest of
/// the application uses.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(fs, &path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Same as [`load_and_validate`], but a missing file yields the default
/// configuration instead of an error.
pub fn load_or_default(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if fs.exists(path) {
        load_and_validate(fs, path)
    } else {
        tracing::info!(path = ?path, "config file not found; using defaults");
        Ok(ConfigFile::default())
    }
}

/// Default config path: `Jobwatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobwatch.toml")
}
