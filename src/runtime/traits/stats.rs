// ABOUTME: Resource statistics trait for container runtimes.
// ABOUTME: One non-streaming snapshot carrying its previous-sample counters.

use super::sealed::Sealed;
use super::shared_types::StatsSnapshot;
use crate::types::ContainerId;
use async_trait::async_trait;

/// Resource usage operations.
#[async_trait]
pub trait StatsOps: Sealed + Send + Sync {
    /// Take a single stats snapshot of a running container.
    async fn container_stats(&self, id: &ContainerId) -> Result<StatsSnapshot, StatsError>;
}

/// Errors from stats operations.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("runtime returned no stats sample for {0}")]
    Empty(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
