// ABOUTME: Container lifecycle: replace the deployment's container with a fresh one.
// ABOUTME: Remove old, ensure networks, create with routing labels, start.

use std::collections::HashMap;

use crate::runtime::{
    ContainerConfig, ContainerError, ContainerOps, ExposedPort, NetworkConfig, NetworkError,
    NetworkOps, RestartPolicyConfig,
};
use crate::types::{ContainerId, NetworkId};

use super::error::ContainerErrorExt;
use super::{DeployError, Deployment};

/// Where the reverse proxy and database live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSettings {
    /// Network shared with the reverse proxy.
    pub proxy_network: String,
    /// Proxy entrypoint that serves the deployment.
    pub entrypoint: String,
    /// Domain appended to the subdomain in the host rule.
    pub domain: String,
    /// Reserved network for database access.
    pub database_network: String,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            proxy_network: "traefik_init_default".to_string(),
            entrypoint: "web".to_string(),
            domain: "localhost".to_string(),
            database_network: "db-network".to_string(),
        }
    }
}

/// Reverse-proxy labels that make the container routable as `<subdomain>.<domain>`.
pub fn routing_labels(deployment: &Deployment, routing: &RoutingSettings) -> HashMap<String, String> {
    let router = deployment.subdomain.as_str();
    let mut labels = HashMap::new();
    labels.insert("traefik.enable".to_string(), "true".to_string());
    labels.insert(
        format!("traefik.http.routers.{}.rule", router),
        format!("Host(`{}.{}`)", router, routing.domain),
    );
    labels.insert(
        format!("traefik.http.routers.{}.entrypoints", router),
        routing.entrypoint.clone(),
    );
    labels.insert(
        "traefik.docker.network".to_string(),
        routing.proxy_network.clone(),
    );
    labels.insert(
        format!("traefik.http.services.{}.loadbalancer.server.port", router),
        deployment.port.to_string(),
    );
    labels
}

/// Container configuration for `deployment`.
pub fn container_config(deployment: &Deployment, routing: &RoutingSettings) -> ContainerConfig {
    ContainerConfig {
        name: deployment.container_name().to_string(),
        image: deployment.image_tag(),
        labels: routing_labels(deployment, routing),
        exposed_ports: vec![ExposedPort::tcp(deployment.port)],
        restart_policy: RestartPolicyConfig::UnlessStopped,
        networks: vec![
            routing.database_network.clone(),
            routing.proxy_network.clone(),
        ],
    }
}

/// Ensure a bridge network named `name` exists, creating it if necessary.
pub async fn ensure_network<R: NetworkOps + ?Sized>(
    runtime: &R,
    name: &str,
) -> Result<NetworkId, DeployError> {
    if runtime.network_exists(name).await? {
        return Ok(NetworkId::new(name));
    }

    let config = NetworkConfig {
        name: name.to_string(),
        driver: Some("bridge".to_string()),
        labels: HashMap::new(),
    };

    match runtime.create_network(&config).await {
        Ok(_) => {
            tracing::info!("created network {}", name);
            Ok(NetworkId::new(name))
        }
        // Created between check and create
        Err(NetworkError::AlreadyExists(_)) => Ok(NetworkId::new(name)),
        Err(e) => Err(DeployError::ContainerOpFailed(format!(
            "failed to create network {}: {}",
            name, e
        ))),
    }
}

/// Remove the existing container for `deployment`, if any.
///
/// Returns whether a container was removed.
pub async fn remove_existing<R: ContainerOps + ?Sized>(
    runtime: &R,
    deployment: &Deployment,
) -> Result<bool, DeployError> {
    let name = ContainerId::new(deployment.container_name());

    let existing = match runtime.inspect_container(&name).await {
        Ok(info) => info,
        Err(ContainerError::NotFound(_)) => return Ok(false),
        Err(e) => {
            return Err(DeployError::ContainerOpFailed(format!(
                "failed to inspect {}: {}",
                name, e
            )));
        }
    };

    tracing::debug!(
        "removing existing container {} ({:?})",
        existing.name,
        existing.state
    );
    runtime
        .remove_container(&existing.id, true)
        .await
        .op_context(&format!("failed to remove {}", name))?;
    Ok(true)
}

/// Replace the deployment's container with one running its current image.
///
/// There is no overlap: the old container is gone before the new one starts.
pub async fn replace_container<R: ContainerOps + NetworkOps + ?Sized>(
    runtime: &R,
    deployment: &Deployment,
    routing: &RoutingSettings,
) -> Result<ContainerId, DeployError> {
    remove_existing(runtime, deployment).await?;

    ensure_network(runtime, &routing.database_network).await?;
    ensure_network(runtime, &routing.proxy_network).await?;

    let config = container_config(deployment, routing);
    let id = runtime
        .create_container(&config)
        .await
        .op_context("failed to create container")?;

    runtime
        .start_container(&id)
        .await
        .op_context("failed to start container")?;

    tracing::info!("{}: container {} started", deployment.id, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::testing::{Call, FakeRuntime, sample_deployment};
    use crate::runtime::ContainerState;

    #[test]
    fn labels_route_subdomain_through_proxy() {
        let d = sample_deployment();
        let labels = routing_labels(&d, &RoutingSettings::default());

        assert_eq!(labels["traefik.enable"], "true");
        assert_eq!(
            labels[&format!("traefik.http.routers.{}.rule", d.subdomain)],
            format!("Host(`{}.localhost`)", d.subdomain)
        );
        assert_eq!(
            labels[&format!("traefik.http.routers.{}.entrypoints", d.subdomain)],
            "web"
        );
        assert_eq!(labels["traefik.docker.network"], "traefik_init_default");
    }

    #[test]
    fn config_attaches_both_networks() {
        let d = sample_deployment();
        let config = container_config(&d, &RoutingSettings::default());

        assert_eq!(config.name, d.id.as_str());
        assert_eq!(config.image, d.image_tag());
        assert_eq!(config.restart_policy, RestartPolicyConfig::UnlessStopped);
        assert_eq!(config.networks, vec!["db-network", "traefik_init_default"]);
        assert_eq!(config.exposed_ports, vec![ExposedPort::tcp(d.port)]);
    }

    #[tokio::test]
    async fn replace_removes_existing_before_create() {
        let d = sample_deployment();
        let runtime = FakeRuntime::new().with_container(d.container_name(), ContainerState::Running);

        replace_container(&runtime, &d, &RoutingSettings::default())
            .await
            .unwrap();

        let calls = runtime.calls();
        let remove = calls
            .iter()
            .position(|c| matches!(c, Call::Remove(_)))
            .unwrap();
        let create = calls
            .iter()
            .position(|c| matches!(c, Call::Create(_)))
            .unwrap();
        assert!(remove < create);
        assert!(calls.iter().any(|c| matches!(c, Call::Start(_))));
    }

    #[tokio::test]
    async fn remove_failure_aborts_before_create() {
        let d = sample_deployment();
        let runtime = FakeRuntime::new()
            .with_container(d.container_name(), ContainerState::Running)
            .fail_remove();

        let err = replace_container(&runtime, &d, &RoutingSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), super::super::DeployErrorKind::ContainerOpFailed);
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::Create(_))));
    }

    #[tokio::test]
    async fn fresh_deployment_skips_removal_and_creates_networks() {
        let d = sample_deployment();
        let runtime = FakeRuntime::new();

        replace_container(&runtime, &d, &RoutingSettings::default())
            .await
            .unwrap();

        let calls = runtime.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Remove(_))));
        assert!(calls.contains(&Call::CreateNetwork("db-network".to_string())));
        assert!(calls.contains(&Call::CreateNetwork("traefik_init_default".to_string())));
    }

    #[tokio::test]
    async fn inspect_error_other_than_not_found_aborts() {
        let d = sample_deployment();
        let runtime = FakeRuntime::new().fail_inspect();

        let err = replace_container(&runtime, &d, &RoutingSettings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inspect"));
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::Create(_))));
    }
}
