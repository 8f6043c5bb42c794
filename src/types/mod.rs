// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod deployment_id;
mod id;
mod subdomain;

pub use deployment_id::{DeploymentId, DeploymentIdError};
pub use id::{ContainerId, NetworkId};
pub use subdomain::{Subdomain, SubdomainError};
