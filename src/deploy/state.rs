// ABOUTME: In-flight deployment status and the lease that guards a run.
// ABOUTME: Leases record holder host, pid and acquisition time with a ttl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Message recorded when a run starts.
pub const DEPLOYING_MESSAGE: &str = "Deploying..";

/// Status of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Idle,
    Deploying,
    Completed,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Idle => "idle",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Who is running a deployment and until when the claim holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Hostname of the machine that holds the lease.
    pub holder: String,
    /// Process ID of the lease holder.
    pub pid: u32,
    /// When the lease was acquired.
    pub acquired_at: DateTime<Utc>,
    /// How long the lease stays valid.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Lease {
    /// Create a lease for the current process.
    pub fn acquire(ttl: Duration) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            ttl,
        }
    }

    /// Check if the lease is older than its ttl.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // A ttl too large for chrono never expires.
        chrono::Duration::from_std(self.ttl)
            .map(|ttl| now - self.acquired_at >= ttl)
            .unwrap_or(false)
    }
}

/// Status entry for one deployment in the state registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    pub message: String,
    /// Present while the entry is Deploying.
    pub lease: Option<Lease>,
}

impl DeploymentState {
    /// A fresh Deploying entry holding a new lease.
    pub fn deploying(ttl: Duration) -> Self {
        Self {
            status: DeploymentStatus::Deploying,
            started_at: Utc::now(),
            message: DEPLOYING_MESSAGE.to_string(),
            lease: Some(Lease::acquire(ttl)),
        }
    }

    /// Whether a live run currently owns this entry.
    pub fn is_held(&self) -> bool {
        self.status == DeploymentStatus::Deploying
            && self.lease.as_ref().is_some_and(|l| !l.is_expired())
    }
}
