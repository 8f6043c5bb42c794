// ABOUTME: Configuration types and parsing for skiff.yml and deployment manifests.
// ABOUTME: Missing orchestrator config means built-in defaults.

mod env_value;
mod manifest;

pub use env_value::{EnvEntry, EnvValue, resolve_env_list};
pub use manifest::{MANIFEST_FILENAME, MANIFEST_FILENAME_ALT, Manifest, init_manifest};

use crate::deploy::{
    DEFAULT_CAPACITY, DEFAULT_FOLLOW_TIMEOUT, DEFAULT_LEASE_TTL, DEFAULT_MAX_CONCURRENT,
    DEFAULT_TAIL, PipelineSettings, RoutingSettings,
};
use crate::error::{Error, Result};
use crate::runtime::{RuntimeConfig, RuntimeType};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "skiff.yml";
pub const CONFIG_FILENAME_ALT: &str = "skiff.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".skiff/config.yml";

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Working copies live at `projects_dir/<id>`.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,

    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    #[serde(default)]
    pub socket: Option<String>,

    /// Image build command; defaults to the runtime's CLI.
    #[serde(default)]
    pub build_tool: Option<String>,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default = "default_database_network")]
    pub database_network: String,

    #[serde(default = "default_lease_ttl", with = "humantime_serde")]
    pub lease_ttl: Duration,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_network")]
    pub network: String,
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            network: default_proxy_network(),
            entrypoint: default_entrypoint(),
            domain: default_domain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    #[serde(default = "default_log_tail")]
    pub tail: u64,
    #[serde(default = "default_follow_timeout", with = "humantime_serde")]
    pub follow_timeout: Duration,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            tail: default_log_tail(),
            follow_timeout: default_follow_timeout(),
        }
    }
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("/projects")
}

fn default_proxy_network() -> String {
    "traefik_init_default".to_string()
}

fn default_entrypoint() -> String {
    "web".to_string()
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_database_network() -> String {
    "db-network".to_string()
}

fn default_lease_ttl() -> Duration {
    DEFAULT_LEASE_TTL
}

fn default_event_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_max_concurrent_runs() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_log_tail() -> u64 {
    DEFAULT_TAIL
}

fn default_follow_timeout() -> Duration {
    DEFAULT_FOLLOW_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            runtime: None,
            socket: None,
            build_tool: None,
            proxy: ProxyConfig::default(),
            database_network: default_database_network(),
            lease_ttl: default_lease_ttl(),
            events: EventsConfig::default(),
            max_concurrent_runs: default_max_concurrent_runs(),
            logs: LogsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading config from {}", path.display());
                return Self::load(path);
            }
        }

        tracing::debug!("no config in {}, using defaults", dir.display());
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_runs == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(Error::InvalidConfig(
                "events.capacity must be at least 1".to_string(),
            ));
        }
        if self.proxy.domain.trim().is_empty() {
            return Err(Error::InvalidConfig("proxy.domain cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        }
    }

    pub fn routing_settings(&self) -> RoutingSettings {
        RoutingSettings {
            proxy_network: self.proxy.network.clone(),
            entrypoint: self.proxy.entrypoint.clone(),
            domain: self.proxy.domain.clone(),
            database_network: self.database_network.clone(),
        }
    }

    /// Stage settings for a pipeline talking to `runtime`.
    pub fn pipeline_settings(&self, runtime: RuntimeType) -> PipelineSettings {
        PipelineSettings {
            build_tool: self
                .build_tool
                .clone()
                .unwrap_or_else(|| runtime.cli_name().to_string()),
            routing: self.routing_settings(),
        }
    }
}
