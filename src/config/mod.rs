// Configuration management
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Profile -> cache-file mapping document; defaults to
    /// mappings.json in the config directory.
    pub mapping_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsConfig {
    /// Credential cache directory; defaults to ~/.aws/cli/cache.
    pub cache_dir: Option<PathBuf>,
    /// AWS config file; defaults to ~/.aws/config.
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Hard timeout for external aws CLI invocations, in seconds.
    #[serde(default = "default_process_timeout")]
    pub process_timeout: u64,
    /// How often the monitor re-reads the cache to pick up renewals done
    /// outside of it, in seconds.
    #[serde(default = "default_revalidate_interval")]
    pub revalidate_interval: u64,
}

fn default_process_timeout() -> u64 {
    180
}

fn default_revalidate_interval() -> u64 {
    60
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            process_timeout: default_process_timeout(),
            revalidate_interval: default_revalidate_interval(),
        }
    }
}

impl Config {
    /// Get the config directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/ssomon (if env var is set)
    /// 2. ~/.config/ssomon (if ~/.config exists)
    /// 3. ~/.ssomon (fallback on Unix, doesn't create ~/.config)
    /// 4. Platform default on Windows
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("ssomon"));
        }

        #[cfg(unix)]
        {
            if let Some(home_dir) = dirs::home_dir() {
                let xdg_config = home_dir.join(".config");

                if xdg_config.exists() {
                    return Ok(xdg_config.join("ssomon"));
                }

                return Ok(home_dir.join(".ssomon"));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                return Ok(config_dir.join("ssomon"));
            }
        }

        Err(Error::Config(
            "Could not determine config directory".to_string(),
        ))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Where the profile -> cache-file mapping document lives.
    pub fn mapping_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("mappings.json"))
    }

    /// Load configuration from file, environment variables, and defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        let mut config = if config_path.exists() {
            tracing::debug!("Loading config from: {}", config_path.display());
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

            toml::from_str(&contents)?
        } else {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Config::default()
        };

        if let Ok(cache_dir) = std::env::var("SSOMON_CACHE_DIR") {
            tracing::debug!("Using SSOMON_CACHE_DIR from environment: {}", cache_dir);
            config.aws.cache_dir = Some(PathBuf::from(cache_dir));
        }

        if let Ok(config_file) = std::env::var("SSOMON_AWS_CONFIG_FILE") {
            tracing::debug!(
                "Using SSOMON_AWS_CONFIG_FILE from environment: {}",
                config_file
            );
            config.aws.config_file = Some(PathBuf::from(config_file));
        }

        Ok(config)
    }
}
