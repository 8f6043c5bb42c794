// ABOUTME: Short generated identifier that names everything a deployment owns.
// ABOUTME: Working-copy path, image tag and container name all derive from it.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated identifiers.
pub const ID_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeploymentIdError {
    #[error("deployment id cannot be empty")]
    Empty,

    #[error("deployment id exceeds maximum length of 63 characters")]
    TooLong,

    #[error("invalid character in deployment id: '{0}'")]
    InvalidChar(char),
}

/// Identifier of a deployment.
///
/// Accepted ids are lowercase alphanumeric so they are valid as a directory
/// name, an image name and a container name at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..ID_LEN)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn new(value: &str) -> Result<Self, DeploymentIdError> {
        if value.is_empty() {
            return Err(DeploymentIdError::Empty);
        }
        if value.len() > 63 {
            return Err(DeploymentIdError::TooLong);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        {
            return Err(DeploymentIdError::InvalidChar(c));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag of the image built for this deployment.
    pub fn image_tag(&self) -> String {
        format!("{}-image", self.0)
    }

    /// Name of the container running this deployment.
    pub fn container_name(&self) -> &str {
        &self.0
    }

    /// Working copy location under the projects base directory.
    pub fn project_path(&self, base: &Path) -> PathBuf {
        base.join(&self.0)
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeploymentId {
    type Err = DeploymentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for DeploymentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeploymentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
