// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Detection, capability traits and the bollard-backed implementation.

mod bollard;
mod detection;
mod error;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{DetectedRuntime, RuntimeConfig, RuntimeType};

/// Detect and connect to the local runtime, verifying it answers a ping.
pub async fn connect_local(config: &RuntimeConfig) -> Result<BollardRuntime, RuntimeError> {
    let detected = detect_local(config)?;
    tracing::debug!(
        "connecting to {} at {}",
        detected.runtime_type,
        detected.socket_path
    );
    let runtime = BollardRuntime::connect(&detected)?;
    runtime.ping().await?;
    Ok(runtime)
}
