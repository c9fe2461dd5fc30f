//! Configuration handling for sshmole
//!
//! The config is a YAML file, `~/.sshmole.yml` unless overridden by
//! `--config` or `SSHMOLE_CONFIG`:
//!
//! ```yaml
//! python: python3
//! sshuttle_dir: ~/.sshuttle
//! endpoints:
//!   - name: work
//!     remote: bastion
//!     subnets: [10.0.0.0/24]
//! ```
//!
//! Loading validates every endpoint, so a [`Config`] only ever holds
//! well-formed profiles.

use crate::endpoint::{validate_endpoints, Endpoint, RawEndpoint, ValidationError};
use crate::resolve::Resolver;
use crate::sshuttle::pidfile::DEFAULT_PID_DIR;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "SSHMOLE_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = ".sshmole.yml";
pub const DEFAULT_SSHUTTLE_DIR: &str = ".sshuttle";
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("Invalid endpoint: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("sshuttle_dir {0} exists, but is not a directory")]
    NotADirectory(PathBuf),
    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_python")]
    python: String,
    #[serde(default)]
    sshuttle_dir: Option<String>,
    #[serde(default)]
    stop_timeout_secs: Option<u64>,
    #[serde(default)]
    pid_dir: Option<String>,
    endpoints: Vec<RawEndpoint>,
}

fn default_python() -> String {
    "python3".to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Python interpreter used by `setup-sshuttle`
    pub python: String,
    /// Where sshuttle is (or will be) installed; sshuttle runs from here
    pub sshuttle_dir: PathBuf,
    /// How long `stop` waits for a tunnel to exit
    pub stop_timeout: Duration,
    /// Directory holding the per-profile PID files
    pub pid_dir: PathBuf,
    endpoints: Vec<Endpoint>,
}

impl Config {
    pub fn load(path: &Path, resolver: &dyn Resolver) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Reading config from {}", path.display());
        Self::from_yaml(&content, resolver)
    }

    pub fn from_yaml(content: &str, resolver: &dyn Resolver) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;

        let sshuttle_dir = match raw.sshuttle_dir {
            Some(dir) => expand_path(&dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDirectory)?
                .join(DEFAULT_SSHUTTLE_DIR),
        };
        if sshuttle_dir.exists() && !sshuttle_dir.is_dir() {
            return Err(ConfigError::NotADirectory(sshuttle_dir));
        }

        let pid_dir = raw
            .pid_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_DIR));

        let endpoints = validate_endpoints(raw.endpoints, resolver)?;
        debug!("Loaded {} endpoints", endpoints.len());

        Ok(Self {
            python: raw.python,
            sshuttle_dir,
            stop_timeout: Duration::from_secs(
                raw.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            ),
            pid_dir,
            endpoints,
        })
    }

    /// Endpoints in declaration order
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.name() == name)
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.endpoints.iter().map(Endpoint::name).collect()
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Config file location: `--config`, then `SSHMOLE_CONFIG`, then `~/.sshmole.yml`
pub fn config_path(flag: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    config_path_from(flag, env::var_os(CONFIG_ENV_VAR), dirs::home_dir())
}

fn config_path_from(
    flag: Option<PathBuf>,
    env_value: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    home.map(|home| home.join(DEFAULT_CONFIG_FILE))
        .ok_or(ConfigError::NoHomeDirectory)
}
