// ABOUTME: Error types for deployment operations.
// ABOUTME: One variant per pipeline stage plus state registry conflicts.

use crate::runtime::{ContainerError, LogError, NetworkError, StatsError};

/// Errors that can occur while running or tracking a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Clone or pull of the working copy failed.
    #[error("failed to fetch source: {0}")]
    FetchFailed(String),

    /// No marker file matched the working copy.
    #[error("could not discover service type: {0}")]
    ServiceDiscoveryFailed(String),

    /// The project type has no build recipe template.
    #[error("invalid project type: {0}")]
    InvalidProjectType(String),

    /// The build recipe could not be written.
    #[error("failed to write build recipe: {0}")]
    RecipeFailed(String),

    /// An env var key is not a valid variable name.
    #[error("invalid env var key: {0:?}")]
    InvalidEnvVar(String),

    /// The image build tool failed.
    #[error("failed to build image: {0}")]
    BuildFailed(String),

    /// A container runtime call failed.
    #[error("container operation failed: {0}")]
    ContainerOpFailed(String),

    /// A run for this deployment is already in progress.
    #[error("deployment {0} is already deploying")]
    StateConflict(String),

    /// No entry for this identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// A deployment already claims this subdomain.
    #[error("deployment already exists for subdomain {0}")]
    AlreadyExists(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    FetchFailed,
    ServiceDiscoveryFailed,
    InvalidProjectType,
    RecipeFailed,
    InvalidEnvVar,
    BuildFailed,
    ContainerOpFailed,
    StateConflict,
    NotFound,
    AlreadyExists,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::FetchFailed(_) => DeployErrorKind::FetchFailed,
            DeployError::ServiceDiscoveryFailed(_) => DeployErrorKind::ServiceDiscoveryFailed,
            DeployError::InvalidProjectType(_) => DeployErrorKind::InvalidProjectType,
            DeployError::RecipeFailed(_) => DeployErrorKind::RecipeFailed,
            DeployError::InvalidEnvVar(_) => DeployErrorKind::InvalidEnvVar,
            DeployError::BuildFailed(_) => DeployErrorKind::BuildFailed,
            DeployError::ContainerOpFailed(_) => DeployErrorKind::ContainerOpFailed,
            DeployError::StateConflict(_) => DeployErrorKind::StateConflict,
            DeployError::NotFound(_) => DeployErrorKind::NotFound,
            DeployError::AlreadyExists(_) => DeployErrorKind::AlreadyExists,
        }
    }
}

impl From<ContainerError> for DeployError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound(id) => DeployError::NotFound(id),
            other => DeployError::ContainerOpFailed(other.to_string()),
        }
    }
}

impl From<NetworkError> for DeployError {
    fn from(err: NetworkError) -> Self {
        DeployError::ContainerOpFailed(err.to_string())
    }
}

impl From<StatsError> for DeployError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::ContainerNotFound(id) => DeployError::NotFound(id),
            other => DeployError::ContainerOpFailed(other.to_string()),
        }
    }
}

impl From<LogError> for DeployError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::ContainerNotFound(id) => DeployError::NotFound(id),
            other => DeployError::ContainerOpFailed(other.to_string()),
        }
    }
}

/// Attach stage context to a container error.
pub trait ContainerErrorExt<T> {
    fn op_context(self, what: &str) -> Result<T, DeployError>;
}

impl<T> ContainerErrorExt<T> for Result<T, ContainerError> {
    fn op_context(self, what: &str) -> Result<T, DeployError> {
        self.map_err(|e| DeployError::ContainerOpFailed(format!("{}: {}", what, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_not_found_maps_to_not_found() {
        let err: DeployError = ContainerError::NotFound("abc123".to_string()).into();
        assert_eq!(err.kind(), DeployErrorKind::NotFound);
    }

    #[test]
    fn op_context_always_reports_container_failure() {
        let result: Result<(), ContainerError> =
            Err(ContainerError::NotFound("abc123".to_string()));
        let err = result.op_context("remove").unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::ContainerOpFailed);
        assert!(err.to_string().contains("remove"));
    }
}
