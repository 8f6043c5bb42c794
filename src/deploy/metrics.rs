// ABOUTME: Instantaneous resource usage derived from cumulative runtime counters.
// ABOUTME: Finds the deployment's container by image tag and computes CPU percentage.

use serde::{Deserialize, Serialize};

use crate::runtime::{ContainerFilters, ContainerOps, StatsOps, StatsSnapshot};
use crate::types::DeploymentId;

use super::DeployError;

/// Status reported when no container runs the deployment's image.
pub const STOPPED: &str = "STOPPED";

/// Resource usage of one deployment's container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub status: String,
}

impl ContainerStats {
    /// All counters zero with the given status.
    pub fn idle(status: impl Into<String>) -> Self {
        Self {
            cpu_percent: 0.0,
            memory_usage: 0,
            memory_limit: 0,
            network_rx: 0,
            network_tx: 0,
            status: status.into(),
        }
    }
}

/// CPU percentage from a snapshot and its paired previous sample.
///
/// Zero unless both the container and system counters advanced.
pub fn cpu_percent(snapshot: &StatsSnapshot) -> f64 {
    let cpu_delta = snapshot
        .cpu
        .total_usage
        .saturating_sub(snapshot.precpu.total_usage);
    let system_delta = snapshot
        .cpu
        .system_usage
        .saturating_sub(snapshot.precpu.system_usage);

    if system_delta == 0 || cpu_delta == 0 {
        return 0.0;
    }

    let online_cpus = snapshot.cpu.percpu_usage.len().max(1);
    (cpu_delta as f64 / system_delta as f64) * online_cpus as f64 * 100.0
}

/// Derive usage figures from a running container's snapshot.
pub fn compute(snapshot: &StatsSnapshot, status: &str) -> ContainerStats {
    let (network_rx, network_tx) = snapshot
        .networks
        .values()
        .fold((0u64, 0u64), |(rx, tx), n| {
            (rx.saturating_add(n.rx_bytes), tx.saturating_add(n.tx_bytes))
        });

    ContainerStats {
        cpu_percent: cpu_percent(snapshot),
        memory_usage: snapshot.memory_usage,
        memory_limit: snapshot.memory_limit,
        network_rx,
        network_tx,
        status: status.to_string(),
    }
}

/// Current resource usage of the container running `id`'s image.
pub async fn collect_stats<R: ContainerOps + StatsOps + ?Sized>(
    runtime: &R,
    id: &DeploymentId,
) -> Result<ContainerStats, DeployError> {
    let image = id.image_tag();
    let filters = ContainerFilters {
        name: Some(id.container_name().to_string()),
        all: true,
    };
    let containers = runtime.list_containers(&filters).await?;

    let Some(container) = containers.into_iter().find(|c| c.image == image) else {
        return Ok(ContainerStats::idle(STOPPED));
    };

    if container.state != "running" {
        return Ok(ContainerStats::idle(container.state));
    }

    let snapshot = runtime.container_stats(&container.id).await?;
    Ok(compute(&snapshot, &container.state))
}
