// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, NetworkOps, LogOps, StatsOps, RuntimeInfo.

mod container;
mod logs;
mod network;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;
mod stats;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use logs::{LogError, LogLine, LogOps, LogOptions, LogStream};
pub use network::{NetworkError, NetworkOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;
pub use stats::{StatsError, StatsOps};

/// Every capability the deployment service needs from a runtime.
pub trait DeployRuntime: ContainerOps + NetworkOps + LogOps + StatsOps + RuntimeInfo {}

impl<T> DeployRuntime for T where T: ContainerOps + NetworkOps + LogOps + StatsOps + RuntimeInfo {}
