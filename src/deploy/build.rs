// ABOUTME: Image builder: runs the external build tool against a working copy.
// ABOUTME: Produces the deployment's `<id>-image` tag.

use super::command::{CommandRunner, CommandSpec};
use super::{DeployError, Deployment};

/// Command that builds the image for `deployment` with `tool`.
pub fn build_command(tool: &str, deployment: &Deployment) -> CommandSpec {
    CommandSpec::new(tool)
        .arg("build")
        .arg("-t")
        .arg(deployment.image_tag())
        .arg_path(&deployment.project_path)
}

/// Build and tag the image for `deployment`.
pub async fn build_image<C: CommandRunner + ?Sized>(
    runner: &C,
    tool: &str,
    deployment: &Deployment,
) -> Result<String, DeployError> {
    let cmd = build_command(tool, deployment);
    let output = runner
        .run(&cmd)
        .await
        .map_err(|e| DeployError::BuildFailed(format!("failed to run {}: {}", tool, e)))?;

    if !output.success() {
        return Err(DeployError::BuildFailed(format!(
            "{} exited with status {}: {}",
            cmd,
            output.exit_code,
            output.last_line()
        )));
    }

    Ok(deployment.image_tag())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeploymentId, Subdomain};
    use std::path::Path;

    #[test]
    fn build_command_tags_with_deployment_id() {
        let d = Deployment::new(
            DeploymentId::new("q1w2e3").unwrap(),
            Subdomain::new("api").unwrap(),
            "https://example.com/api.git",
            Path::new("/projects"),
        );
        let cmd = build_command("podman", &d);
        assert_eq!(cmd.to_string(), "podman build -t q1w2e3-image /projects/q1w2e3");
    }
}
