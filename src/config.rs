//! Build configuration, loaded from TOML and overridden from the command line

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::builder::reclassify::DEFAULT_MAX_LINK_HOPS;
use crate::builder::BuildOptions;
use crate::tiles::TileLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("level {0} is not one of the standard hierarchy levels")]
    InvalidLevel(u8),
    #[error("threads must be at least 1")]
    InvalidThreads,
    #[error("max_link_hops must be at least 1")]
    InvalidLinkHops,
}

fn default_level() -> u8 {
    2
}

fn default_threads() -> usize {
    num_cpus::get()
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("butterfly-tiles")
}

fn default_tile_dir() -> PathBuf {
    PathBuf::from("tiles")
}

fn default_max_link_hops() -> u32 {
    DEFAULT_MAX_LINK_HOPS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Scratch directory for the edge and shape sequences
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_tile_dir")]
    pub tile_dir: PathBuf,
    #[serde(default = "default_max_link_hops")]
    pub max_link_hops: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            threads: default_threads(),
            work_dir: default_work_dir(),
            tile_dir: default_tile_dir(),
            max_link_hops: default_max_link_hops(),
        }
    }
}

impl BuildConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if TileLevel::from_level(self.level).is_none() {
            return Err(ConfigError::InvalidLevel(self.level));
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        if self.max_link_hops == 0 {
            return Err(ConfigError::InvalidLinkHops);
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            level: self.level,
            work_dir: self.work_dir.clone(),
            threads: self.threads,
            max_link_hops: self.max_link_hops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = BuildConfig::from_toml_str("tile_dir = \"/data/tiles\"\nlevel = 1\n").unwrap();
        assert_eq!(config.level, 1);
        assert_eq!(config.tile_dir, PathBuf::from("/data/tiles"));
        assert_eq!(config.max_link_hops, DEFAULT_MAX_LINK_HOPS);
        assert!(config.threads >= 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            BuildConfig::from_toml_str("level = 3"),
            Err(ConfigError::InvalidLevel(3))
        ));
        assert!(matches!(
            BuildConfig::from_toml_str("threads = 0"),
            Err(ConfigError::InvalidThreads)
        ));
        assert!(matches!(
            BuildConfig::from_toml_str("max_link_hops = 0"),
            Err(ConfigError::InvalidLinkHops)
        ));
        assert!(matches!(
            BuildConfig::from_toml_str("levle = 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn options_carry_config_values() {
        let config = BuildConfig {
            level: 0,
            threads: 3,
            max_link_hops: 8,
            ..Default::default()
        };
        let options = config.build_options();
        assert_eq!((options.level, options.threads, options.max_link_hops), (0, 3, 8));
        assert_eq!(options.work_dir, config.work_dir);
    }
}
