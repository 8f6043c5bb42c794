// ABOUTME: Source fetcher: clone a repository or fast-forward an existing copy.
// ABOUTME: Presence of a .git directory decides between pull and clone.

use std::path::Path;

use super::command::{CommandRunner, CommandSpec};
use super::{DeployError, Deployment};

const GIT: &str = "git";

/// What the fetcher did to the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Cloned,
    Pulled,
}

fn is_repository(path: &Path) -> bool {
    path.join(".git").is_dir()
}

/// Command that brings the working copy of `deployment` up to date.
pub fn fetch_command(deployment: &Deployment) -> (FetchOutcome, CommandSpec) {
    let path = &deployment.project_path;

    if is_repository(path) {
        let cmd = CommandSpec::new(GIT)
            .arg("-C")
            .arg_path(path)
            .arg("pull")
            .arg("--ff-only");
        return (FetchOutcome::Pulled, cmd);
    }

    let mut cmd = CommandSpec::new(GIT).arg("clone");
    if let Some(branch) = deployment.branch_name() {
        cmd = cmd.arg("--branch").arg(branch);
    }
    let cmd = cmd.arg(deployment.clone_url.as_str()).arg_path(path);
    (FetchOutcome::Cloned, cmd)
}

/// Clone or update the working copy of `deployment`.
pub async fn fetch_source<C: CommandRunner + ?Sized>(
    runner: &C,
    deployment: &Deployment,
) -> Result<FetchOutcome, DeployError> {
    if let Some(base) = deployment.project_path.parent() {
        tokio::fs::create_dir_all(base).await.map_err(|e| {
            DeployError::FetchFailed(format!("failed to create {}: {}", base.display(), e))
        })?;
    }

    let (outcome, cmd) = fetch_command(deployment);
    let output = runner
        .run(&cmd)
        .await
        .map_err(|e| DeployError::FetchFailed(format!("failed to run {}: {}", GIT, e)))?;

    if !output.success() {
        return Err(DeployError::FetchFailed(format!(
            "{} exited with status {}: {}",
            cmd,
            output.exit_code,
            output.last_line()
        )));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeploymentId, Subdomain};

    fn deployment(base: &Path) -> Deployment {
        Deployment::new(
            DeploymentId::new("f00bar").unwrap(),
            Subdomain::new("blog").unwrap(),
            "https://example.com/blog.git",
            base,
        )
    }

    #[test]
    fn clones_when_no_repository() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment(dir.path()).with_branch("refs/heads/dev");
        let (outcome, cmd) = fetch_command(&d);

        assert_eq!(outcome, FetchOutcome::Cloned);
        assert_eq!(cmd.program, "git");
        assert_eq!(
            cmd.args,
            vec![
                "clone".to_string(),
                "--branch".to_string(),
                "dev".to_string(),
                "https://example.com/blog.git".to_string(),
                d.project_path.to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn pulls_when_repository_exists() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment(dir.path());
        std::fs::create_dir_all(d.project_path.join(".git")).unwrap();

        let (outcome, cmd) = fetch_command(&d);
        assert_eq!(outcome, FetchOutcome::Pulled);
        assert_eq!(cmd.args.last().map(String::as_str), Some("--ff-only"));
    }
}
