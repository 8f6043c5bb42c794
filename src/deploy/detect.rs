// ABOUTME: Project type detection from marker files in a working copy.
// ABOUTME: Markers are checked in a fixed priority order; first hit wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::DeployError;

/// Runtime or framework category of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    /// Plain Node.js script.
    Node,
    /// Go module compiled to a single binary.
    Golang,
    /// Next.js application.
    Next,
    /// Vite bundle served as static files.
    React,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Node => "node",
            ProjectType::Golang => "golang",
            ProjectType::Next => "next",
            ProjectType::React => "react",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectType {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ProjectType::Node),
            "golang" | "go" => Ok(ProjectType::Golang),
            "next" => Ok(ProjectType::Next),
            "react" | "vite" => Ok(ProjectType::React),
            other => Err(DeployError::InvalidProjectType(other.to_string())),
        }
    }
}

/// Marker files in priority order.
///
/// Framework config files come before generic entry points: a Next.js app
/// usually also has an `index.js` somewhere.
pub const MARKERS: &[(&str, ProjectType)] = &[
    ("next.config.ts", ProjectType::Next),
    ("next.config.mjs", ProjectType::Next),
    ("vite.config.js", ProjectType::React),
    ("go.mod", ProjectType::Golang),
    ("src/index.js", ProjectType::Node),
    ("index.js", ProjectType::Node),
];

/// Detect the project type of the working copy at `path`.
pub fn detect_project_type(path: &Path) -> Result<ProjectType, DeployError> {
    for (marker, project_type) in MARKERS {
        if path.join(marker).exists() {
            tracing::debug!("found marker {} in {}", marker, path.display());
            return Ok(*project_type);
        }
    }

    Err(DeployError::ServiceDiscoveryFailed(format!(
        "no known marker file in {}",
        path.display()
    )))
}
