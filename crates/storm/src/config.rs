use std::fs;
use std::path::{Path, PathBuf};

use lightning::{LightningParams, RebuildPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of a `storm` configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StormConfig {
    pub params: LightningParams,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub rebuild: RebuildPolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Lightning".to_string(),
            rebuild: RebuildPolicy::Rebuild,
        }
    }
}

impl StormConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: StormConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = StormConfig::from_toml_str("").unwrap();
        assert_eq!(config, StormConfig::default());
    }

    #[test]
    fn parses_both_tables() {
        let config = StormConfig::from_toml_str(
            r#"
            [params]
            hue = 120.0
            intensity = 0.6

            [window]
            width = 800
            height = 600
            rebuild = "in-place"
            "#,
        )
        .unwrap();
        assert_eq!(config.params.hue, 120.0);
        assert_eq!(config.params.intensity, 0.6);
        assert_eq!(config.params.size, 1.0);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.rebuild, RebuildPolicy::InPlace);
        assert_eq!(config.window.title, "Lightning");
    }

    #[test]
    fn rejects_unknown_rebuild_policy() {
        let err = StormConfig::from_toml_str("[window]\nrebuild = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_sized_window() {
        let err = StormConfig::from_toml_str("[window]\nwidth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StormConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
