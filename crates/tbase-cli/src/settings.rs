use std::path::Path;

use thiserror::Error;

use tbase_match::{ConfigError, MatchConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load `MatchConfig` from a TOML file; defaults fill every missing field.
pub fn load_match_config(path: Option<&Path>) -> Result<MatchConfig, SettingsError> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            parse_match_config(&content)?
        }
        None => MatchConfig::default(),
    };
    Ok(config)
}

pub fn parse_match_config(content: &str) -> Result<MatchConfig, SettingsError> {
    let config: MatchConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
