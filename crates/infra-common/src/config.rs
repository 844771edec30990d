//! Loading configuration structs from files and the environment

use crate::errors::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            other => Err(Error::Config(format!(
                "Unsupported configuration file extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Parse a configuration document from a string
pub fn parse_config<T: DeserializeOwned>(contents: &str, format: ConfigFormat) -> Result<T> {
    match format {
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| Error::Parse(e.to_string())),
        ConfigFormat::Json => {
            serde_json::from_str(contents).map_err(|e| Error::Parse(e.to_string()))
        }
    }
}

/// Read and parse a TOML or JSON configuration file
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    parse_config(&contents, format)
}

/// Read a typed value from the environment.
///
/// Unset variables yield `Ok(None)`; set but unparsable ones are an error.
pub fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value {:?} for {}", raw, name))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("{}: {}", name, e))),
    }
}
