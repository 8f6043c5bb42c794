// ABOUTME: Deployment manifest (deployment.yml) parsing and scaffolding.
// ABOUTME: Describes one deployment: source, routing subdomain, port and env.

use serde::Deserialize;
use std::path::Path;

use crate::deploy::{DEFAULT_PORT, NewDeployment};
use crate::error::{Error, Result};
use crate::types::{DeploymentId, Subdomain};

use super::env_value::{EnvEntry, resolve_env_list};

pub const MANIFEST_FILENAME: &str = "deployment.yml";
pub const MANIFEST_FILENAME_ALT: &str = "deployment.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Fixed id; generated at registration when absent.
    #[serde(default)]
    pub id: Option<DeploymentId>,

    pub subdomain: Subdomain,

    pub clone_url: String,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub repo_name: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub env: Vec<EnvEntry>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        if manifest.clone_url.trim().is_empty() {
            return Err(Error::InvalidConfig("clone_url cannot be empty".to_string()));
        }
        if manifest.port == 0 {
            return Err(Error::InvalidConfig("port cannot be 0".to_string()));
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(MANIFEST_FILENAME), dir.join(MANIFEST_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ManifestNotFound(dir.to_path_buf()))
    }

    /// Registration request with env values resolved from this process's environment.
    pub fn to_new_deployment(&self) -> Result<NewDeployment> {
        Ok(NewDeployment {
            id: self.id.clone(),
            subdomain: self.subdomain.clone(),
            clone_url: self.clone_url.clone(),
            branch: self.branch.clone(),
            repo_name: self.repo_name.clone(),
            port: self.port,
            env_vars: resolve_env_list(&self.env)?,
        })
    }
}

/// Write a manifest template into `dir`.
pub fn init_manifest(
    dir: &Path,
    subdomain: Option<&str>,
    clone_url: Option<&str>,
    force: bool,
) -> Result<()> {
    let path = dir.join(MANIFEST_FILENAME);

    if path.exists() && !force {
        return Err(Error::AlreadyExists(path));
    }

    let subdomain = match subdomain {
        Some(s) => Subdomain::new(s).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => Subdomain::new("my-app").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };
    let clone_url = clone_url.unwrap_or("https://github.com/you/my-app.git");

    std::fs::write(&path, template_yaml(&subdomain, clone_url))?;
    Ok(())
}

fn template_yaml(subdomain: &Subdomain, clone_url: &str) -> String {
    format!(
        r#"subdomain: {}
clone_url: {}
branch: main
port: {}
env:
  - key: NODE_ENV
    value: production
  # Values can come from the orchestrator's environment
  # - key: DATABASE_URL
  #   value:
  #     env: DATABASE_URL
  #     default: postgres://localhost/app
"#,
        subdomain, clone_url, DEFAULT_PORT
    )
}
