// ABOUTME: Deployment service facade: registration, dispatch and read paths.
// ABOUTME: What an HTTP or webhook layer calls into.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::LogLine;
use crate::types::{DeploymentId, Subdomain};

use super::dispatch::Dispatcher;
use super::events::EventSubscription;
use super::logs::{DEFAULT_TAIL, follow_logs, get_logs};
use super::metrics::{ContainerStats, collect_stats};
use super::pipeline::{DeployOutcome, Pipeline};
use super::state::DeploymentState;
use super::store::DeploymentStore;
use super::{DeployError, Deployment, EnvVar};

/// Fields supplied when registering a deployment.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    /// Fixed id; generated when absent.
    pub id: Option<DeploymentId>,
    pub subdomain: Subdomain,
    pub clone_url: String,
    pub branch: Option<String>,
    pub repo_name: Option<String>,
    pub port: u16,
    pub env_vars: Vec<EnvVar>,
}

/// Entry point for everything that manages deployments.
#[derive(Clone)]
pub struct DeployService {
    store: Arc<dyn DeploymentStore>,
    pipeline: Pipeline,
    dispatcher: Dispatcher,
    projects_dir: PathBuf,
    log_tail: u64,
}

impl std::fmt::Debug for DeployService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployService")
            .field("projects_dir", &self.projects_dir)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl DeployService {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        pipeline: Pipeline,
        dispatcher: Dispatcher,
        projects_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            pipeline,
            dispatcher,
            projects_dir: projects_dir.into(),
            log_tail: DEFAULT_TAIL,
        }
    }

    /// Number of lines [`DeployService::get_logs`] returns.
    pub fn with_log_tail(mut self, tail: u64) -> Self {
        self.log_tail = tail;
        self
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a deployment. The subdomain must be unused.
    pub fn register(&self, new: NewDeployment) -> Result<Deployment, DeployError> {
        if self.store.find_by_subdomain(new.subdomain.as_str()).is_some() {
            return Err(DeployError::AlreadyExists(new.subdomain.to_string()));
        }
        new.env_vars.iter().try_for_each(EnvVar::validate)?;

        let id = new.id.unwrap_or_else(DeploymentId::generate);
        let mut deployment = Deployment::new(id, new.subdomain, new.clone_url, &self.projects_dir)
            .with_port(new.port)
            .with_env_vars(new.env_vars);
        deployment.branch = new.branch;
        deployment.repo_name = new.repo_name;

        self.store.add(&deployment)?;
        tracing::info!(
            "registered {} as {} ({})",
            deployment.clone_url,
            deployment.id,
            deployment.subdomain
        );
        Ok(deployment)
    }

    /// Register a deployment for a pushed repository, using the id as subdomain.
    pub fn register_from_push(
        &self,
        repo_name: &str,
        clone_url: &str,
        branch: &str,
    ) -> Result<Deployment, DeployError> {
        let id = DeploymentId::generate();
        let subdomain = Subdomain::from(&id);
        let deployment = Deployment::new(id, subdomain, clone_url, &self.projects_dir)
            .with_branch(branch);
        let deployment = Deployment {
            repo_name: Some(repo_name.to_string()),
            ..deployment
        };
        self.store.add(&deployment)?;
        Ok(deployment)
    }

    pub fn get(&self, id: &DeploymentId) -> Result<Deployment, DeployError> {
        self.store.get(id)
    }

    pub fn find_by_subdomain(&self, subdomain: &str) -> Option<Deployment> {
        self.store.find_by_subdomain(subdomain)
    }

    pub fn find_by_clone_url(&self, clone_url: &str) -> Option<Deployment> {
        self.store.find_by_clone_url(clone_url)
    }

    pub fn add_env_vars(&self, id: &DeploymentId, vars: &[EnvVar]) -> Result<(), DeployError> {
        self.store.add_env_vars(id, vars)
    }

    pub fn update_env_var(
        &self,
        id: &DeploymentId,
        key: &str,
        value: &str,
    ) -> Result<(), DeployError> {
        self.store.update_env_var(id, key, value)
    }

    pub fn delete_env_var(&self, id: &DeploymentId, key: &str) -> Result<(), DeployError> {
        self.store.delete_env_var(id, key)
    }

    // -------------------------------------------------------------------------
    // Runs
    // -------------------------------------------------------------------------

    /// Start a run in the background and return once it is accepted.
    ///
    /// The state entry is claimed before returning, so a conflicting run is
    /// reported here. A task that has released its claim but not yet exited
    /// does not conflict; the new run is queued behind it. Stage failures are
    /// only visible through events and state.
    pub fn start_deploy(&self, id: &DeploymentId, redeploy: bool) -> Result<(), DeployError> {
        let deployment = self.store.get(id)?;
        self.pipeline.states().set_deploying(id)?;

        let pipeline = self.pipeline.clone();
        let store = Arc::clone(&self.store);
        self.dispatcher.submit(id.clone(), async move {
            let id = deployment.id.clone();
            match pipeline.execute(deployment, redeploy).await {
                Ok(outcome) => save_outcome(store.as_ref(), &outcome),
                Err(e) => tracing::error!("{}: deployment failed: {}", id, e),
            }
        });
        Ok(())
    }

    /// Run a deployment to completion in the caller's task.
    pub async fn deploy_now(
        &self,
        id: &DeploymentId,
        redeploy: bool,
    ) -> Result<DeployOutcome, DeployError> {
        let deployment = self.store.get(id)?;
        let outcome = self.pipeline.run(deployment, redeploy).await?;
        save_outcome(self.store.as_ref(), &outcome);
        Ok(outcome)
    }

    /// Redeploy the deployment built from `clone_url`.
    pub fn redeploy_by_clone_url(&self, clone_url: &str) -> Result<DeploymentId, DeployError> {
        let deployment = self
            .store
            .find_by_clone_url(clone_url)
            .ok_or_else(|| DeployError::NotFound(clone_url.to_string()))?;
        self.start_deploy(&deployment.id, true)?;
        Ok(deployment.id)
    }

    /// React to a repository push: redeploy a known repository or deploy a new one.
    pub fn handle_push(
        &self,
        repo_name: &str,
        clone_url: &str,
        branch: &str,
    ) -> Result<DeploymentId, DeployError> {
        if self.store.find_by_clone_url(clone_url).is_some() {
            return self.redeploy_by_clone_url(clone_url);
        }
        let deployment = self.register_from_push(repo_name, clone_url, branch)?;
        self.start_deploy(&deployment.id, false)?;
        Ok(deployment.id)
    }

    /// Wait for the background run of `id`, if any.
    pub async fn wait(&self, id: &DeploymentId) {
        self.dispatcher.wait(id).await;
    }

    // -------------------------------------------------------------------------
    // Read paths
    // -------------------------------------------------------------------------

    pub fn get_state(&self, id: &DeploymentId) -> Result<DeploymentState, DeployError> {
        self.pipeline.states().get(id)
    }

    pub fn list_ongoing(&self) -> Vec<(DeploymentId, DeploymentState)> {
        self.pipeline.states().list_ongoing()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.pipeline.events().subscribe()
    }

    pub fn subscribe_to(&self, id: &DeploymentId) -> EventSubscription {
        self.pipeline.events().subscribe_to(id)
    }

    pub async fn get_stats(&self, id: &DeploymentId) -> Result<ContainerStats, DeployError> {
        collect_stats(self.pipeline.runtime().as_ref(), id).await
    }

    pub async fn get_logs(&self, id: &DeploymentId) -> Result<Vec<String>, DeployError> {
        get_logs(self.pipeline.runtime().as_ref(), id, self.log_tail).await
    }

    pub async fn follow_logs<F>(
        &self,
        id: &DeploymentId,
        timeout: Duration,
        on_line: F,
    ) -> Result<usize, DeployError>
    where
        F: FnMut(LogLine) + Send,
    {
        follow_logs(self.pipeline.runtime().as_ref(), id, timeout, on_line).await
    }
}

fn save_outcome(store: &dyn DeploymentStore, outcome: &DeployOutcome) {
    if let Err(e) = store.update(&outcome.deployment) {
        tracing::warn!(
            "{}: could not record detected project type: {}",
            outcome.deployment.id,
            e
        );
    }
}
