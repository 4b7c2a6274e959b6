// src/config.rs

use orbital_ephemeris::EphemerisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aspects::AspectConfig;
use crate::ledger::LedgerConfig;
use crate::synthesis::SynthesisConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Every section is optional in the TOML file; missing keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    pub aspects: AspectConfig,
    pub synthesis: SynthesisConfig,
    pub ephemeris: EphemerisConfig,
    pub ledger: LedgerConfig,
}

impl ResonanceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ResonanceConfig::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ResonanceConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aspects.validate()?;
        self.synthesis.validate()?;
        if !(self.ephemeris.min_julian_day < self.ephemeris.max_julian_day) {
            return Err(ConfigError::invalid(
                "ephemeris.min_julian_day",
                "must be lower than ephemeris.max_julian_day",
            ));
        }
        Ok(())
    }
}
