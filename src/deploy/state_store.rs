// ABOUTME: Registry of in-flight deployment status behind an injectable trait.
// ABOUTME: In-memory implementation holds its lock only for map access.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::DeploymentId;

use super::DeployError;
use super::state::{DEPLOYING_MESSAGE, DeploymentState, DeploymentStatus, Lease};

/// Default lease lifetime for a run.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(60 * 60);

/// Storage for deployment run state.
///
/// Every method returns owned copies; callers never see internal state.
pub trait StateStore: Send + Sync {
    /// Claim `id` for a new run.
    ///
    /// Fails with `StateConflict` while another live run holds the entry.
    fn set_deploying(&self, id: &DeploymentId) -> Result<(), DeployError>;

    /// Update status and message of an existing entry in place.
    fn set_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
        message: &str,
    ) -> Result<(), DeployError>;

    /// Remove the entry for `id`.
    fn delete(&self, id: &DeploymentId) -> Result<(), DeployError>;

    /// Look up the entry for `id`.
    fn get(&self, id: &DeploymentId) -> Result<DeploymentState, DeployError>;

    /// All entries currently Deploying.
    fn list_ongoing(&self) -> Vec<(DeploymentId, DeploymentState)>;
}

/// Process-local state store.
#[derive(Debug)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<DeploymentId, DeploymentState>>,
    lease_ttl: Duration,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE_TTL)
    }
}

impl MemoryStateStore {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            lease_ttl,
        }
    }
}

impl StateStore for MemoryStateStore {
    fn set_deploying(&self, id: &DeploymentId) -> Result<(), DeployError> {
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(id) else {
            entries.insert(id.clone(), DeploymentState::deploying(self.lease_ttl));
            tracing::debug!("{}: registered as deploying", id);
            return Ok(());
        };

        if entry.status == DeploymentStatus::Deploying {
            match &entry.lease {
                Some(lease) if !lease.is_expired() => {
                    return Err(DeployError::StateConflict(id.to_string()));
                }
                Some(lease) => {
                    tracing::warn!(
                        "Taking over expired lease on {} held by {} (pid {}) since {}",
                        id,
                        lease.holder,
                        lease.pid,
                        lease.acquired_at
                    );
                }
                None => {
                    tracing::warn!("Taking over {} with no lease recorded", id);
                }
            }
        }

        *entry = DeploymentState {
            status: DeploymentStatus::Deploying,
            started_at: chrono::Utc::now(),
            message: DEPLOYING_MESSAGE.to_string(),
            lease: Some(Lease::acquire(self.lease_ttl)),
        };
        tracing::debug!("{}: transitioned to deploying", id);
        Ok(())
    }

    fn set_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
        message: &str,
    ) -> Result<(), DeployError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| DeployError::NotFound(id.to_string()))?;

        entry.status = status;
        entry.message = message.to_string();
        if status != DeploymentStatus::Deploying {
            entry.lease = None;
        }
        tracing::debug!("{}: status {} ({})", id, status, message);
        Ok(())
    }

    fn delete(&self, id: &DeploymentId) -> Result<(), DeployError> {
        self.entries
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DeployError::NotFound(id.to_string()))
    }

    fn get(&self, id: &DeploymentId) -> Result<DeploymentState, DeployError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(id.to_string()))
    }

    fn list_ongoing(&self) -> Vec<(DeploymentId, DeploymentState)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, state)| state.status == DeploymentStatus::Deploying)
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }
}
