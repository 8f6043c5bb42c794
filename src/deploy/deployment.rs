// ABOUTME: Deployment record: source, routing identity and container settings.
// ABOUTME: Derived names (path, image tag, container) all come from the id.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{DeploymentId, Subdomain};

use super::{DeployError, ProjectType};

/// Port the container listens on when none is configured.
pub const DEFAULT_PORT: u16 = 3000;

/// One environment variable baked into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Check that the key is a plain variable name (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn validate(&self) -> Result<(), DeployError> {
        validate_env_key(&self.key)
    }
}

/// Reject keys that are not `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_env_key(key: &str) -> Result<(), DeployError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DeployError::InvalidEnvVar(key.to_string()))
    }
}

/// A tracked unit of source, configuration and routing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub subdomain: Subdomain,
    pub clone_url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    /// Working copy location, always `<projects_dir>/<id>`.
    pub project_path: PathBuf,
    /// Last detected type; `None` until the first run detects it.
    #[serde(default)]
    pub project_type: Option<ProjectType>,
    pub port: u16,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
}

impl Deployment {
    /// Create a deployment whose working copy lives under `projects_dir`.
    pub fn new(
        id: DeploymentId,
        subdomain: Subdomain,
        clone_url: impl Into<String>,
        projects_dir: &Path,
    ) -> Self {
        let project_path = id.project_path(projects_dir);
        Self {
            id,
            subdomain,
            clone_url: clone_url.into(),
            branch: None,
            repo_name: None,
            project_path,
            project_type: None,
            port: DEFAULT_PORT,
            env_vars: Vec::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_env_vars(mut self, env_vars: Vec<EnvVar>) -> Self {
        self.env_vars = env_vars;
        self
    }

    /// Tag of the image built for this deployment.
    pub fn image_tag(&self) -> String {
        self.id.image_tag()
    }

    /// Name of the container running this deployment.
    pub fn container_name(&self) -> &str {
        self.id.container_name()
    }

    /// Branch with any `refs/heads/` prefix removed.
    pub fn branch_name(&self) -> Option<&str> {
        self.branch
            .as_deref()
            .map(|b| b.strip_prefix("refs/heads/").unwrap_or(b))
            .filter(|b| !b.is_empty())
    }
}
