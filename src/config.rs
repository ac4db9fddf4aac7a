//! Configuration file support for backboard
//!
//! Reads from .backboard/config.toml

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Repositories to track, in display order
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

/// HTTP server and refresh settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    /// Default: "127.0.0.1:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Branch shown when a request names none
    #[serde(default)]
    pub default_branch: Option<String>,

    /// Request handling threads
    /// Default: 4
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between background refreshes
    /// Default: 300
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

/// One tracked repository
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RepoConfig {
    /// GitHub owner, e.g. "cockroachdb"
    pub owner: String,

    /// GitHub repository name, e.g. "cockroach"
    pub name: String,

    /// Local clone used for history walks
    /// Default: "."
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Trunk branch name
    /// Default: "master"
    #[serde(default = "default_trunk")]
    pub trunk: String,

    /// Remote whose branches are read
    /// Default: "origin"
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branches matching this pattern are release branches
    /// Default: `^release-\d+\.\d+$`
    #[serde(default = "default_release_pattern")]
    pub release_branch_pattern: String,

    /// Run `git fetch` before every sync
    /// Default: true
    #[serde(default = "default_true")]
    pub fetch: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_trunk() -> String {
    "master".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_release_pattern() -> String {
    r"^release-\d+\.\d+$".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_branch: None,
            workers: default_workers(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl RepoConfig {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            path: default_path(),
            trunk: default_trunk(),
            remote: default_remote(),
            release_branch_pattern: default_release_pattern(),
            fetch: true,
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn release_pattern(&self) -> Result<Regex> {
        Regex::new(&self.release_branch_pattern).map_err(|e| {
            ConfigError::Invalid(format!(
                "repos.{}: bad release_branch_pattern: {}",
                self.full_name(),
                e
            ))
        })
    }
}

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl Config {
    /// Load config from `BACKBOARD_CONFIG` or .backboard/config.toml.
    /// Returns default config if no file exists.
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("BACKBOARD_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".backboard").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be at least 1".into()));
        }
        for repo in &self.repos {
            if repo.owner.trim().is_empty() || repo.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "every [[repos]] entry needs an owner and a name".into(),
                ));
            }
            repo.release_pattern()?;
        }
        Ok(())
    }
}
