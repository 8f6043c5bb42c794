// ABOUTME: Deployment pipeline using the type state pattern.
// ABOUTME: Fetch, recipe, build and container replace, with an event per stage.

use std::sync::Arc;

use crate::runtime::DeployRuntime;
use crate::types::{ContainerId, DeploymentId};

use super::build::build_image;
use super::command::CommandRunner;
use super::container::{RoutingSettings, replace_container};
use super::detect::detect_project_type;
use super::events::{DeployEvent, EventBus};
use super::fetch::{FetchOutcome, fetch_source};
use super::recipe::{RecipeParams, recipe_exists, write_recipe};
use super::state::DeploymentStatus;
use super::state_store::StateStore;
use super::{DeployError, Deployment, ProjectType};

/// Message of the final success event.
pub const SUCCESS_MESSAGE: &str = "deployment successful";

const RECIPE_CREATED_MESSAGE: &str = "docker file created";
const RECIPE_REUSED_MESSAGE: &str = "docker file exists, reusing";

// =============================================================================
// State markers
// =============================================================================

/// Registered in the state store, nothing fetched yet.
/// Available actions: `fetch()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Registered;

/// Working copy is current.
/// Available actions: `reuse_recipe()`, `detect()`
#[derive(Debug, Clone, Copy)]
pub struct Fetched {
    outcome: FetchOutcome,
}

/// Project type is known.
/// Available actions: `synthesize()`
#[derive(Debug, Clone, Copy)]
pub struct Detected {
    project_type: ProjectType,
}

/// Build recipe is in place.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy)]
pub struct RecipeReady {
    /// Type detected in this run; `None` when an existing recipe was reused.
    detected: Option<ProjectType>,
}

/// Image is built and tagged.
/// Available actions: `replace_container()`
#[derive(Debug, Clone)]
pub struct ImageBuilt {
    image: String,
}

/// Container is started.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Running {
    container_id: ContainerId,
}

/// One pipeline run, parameterized by the stage it has reached.
#[derive(Debug)]
pub struct Run<S> {
    deployment: Deployment,
    redeploy: bool,
    state: S,
}

impl<S> Run<S> {
    fn transition<T>(self, state: T) -> Run<T> {
        Run {
            deployment: self.deployment,
            redeploy: self.redeploy,
            state,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn is_redeploy(&self) -> bool {
        self.redeploy
    }
}

impl Run<Registered> {
    pub fn new(deployment: Deployment, redeploy: bool) -> Self {
        Run {
            deployment,
            redeploy,
            state: Registered,
        }
    }

    /// Clone or update the working copy.
    #[must_use = "run state must be used"]
    pub async fn fetch<C: CommandRunner + ?Sized>(
        self,
        runner: &C,
    ) -> Result<Run<Fetched>, DeployError> {
        let outcome = fetch_source(runner, &self.deployment).await?;
        Ok(self.transition(Fetched { outcome }))
    }
}

impl Run<Fetched> {
    pub fn fetch_outcome(&self) -> FetchOutcome {
        self.state.outcome
    }

    /// Whether the working copy's own recipe can be built as is.
    ///
    /// Redeploys never reuse a recipe, so they always pick up project changes.
    pub fn can_reuse_recipe(&self) -> bool {
        !self.redeploy && recipe_exists(&self.deployment.project_path)
    }

    /// Skip detection and build the recipe already in the working copy.
    ///
    /// Returns the run unchanged when there is no recipe to reuse.
    pub fn reuse_recipe(self) -> Result<Run<RecipeReady>, Self> {
        if !self.can_reuse_recipe() {
            return Err(self);
        }
        tracing::debug!("{}: reusing existing recipe", self.deployment.id);
        Ok(self.transition(RecipeReady { detected: None }))
    }

    /// Detect the project type from marker files.
    #[must_use = "run state must be used"]
    pub fn detect(mut self) -> Result<Run<Detected>, DeployError> {
        let project_type = detect_project_type(&self.deployment.project_path)?;
        self.deployment.project_type = Some(project_type);
        Ok(self.transition(Detected { project_type }))
    }
}

impl Run<Detected> {
    pub fn project_type(&self) -> ProjectType {
        self.state.project_type
    }

    /// Write the recipe for the detected type, replacing any existing one.
    #[must_use = "run state must be used"]
    pub async fn synthesize(self) -> Result<Run<RecipeReady>, DeployError> {
        let project_type = self.state.project_type;
        write_recipe(
            &self.deployment.project_path,
            project_type,
            &RecipeParams::from(&self.deployment),
        )
        .await?;
        Ok(self.transition(RecipeReady {
            detected: Some(project_type),
        }))
    }
}

impl Run<RecipeReady> {
    pub fn detected_type(&self) -> Option<ProjectType> {
        self.state.detected
    }

    /// Build the deployment's image with `tool`.
    #[must_use = "run state must be used"]
    pub async fn build<C: CommandRunner + ?Sized>(
        self,
        runner: &C,
        tool: &str,
    ) -> Result<Run<ImageBuilt>, DeployError> {
        let image = build_image(runner, tool, &self.deployment).await?;
        Ok(self.transition(ImageBuilt { image }))
    }
}

impl Run<ImageBuilt> {
    pub fn image(&self) -> &str {
        &self.state.image
    }

    /// Swap the deployment's container for one running the new image.
    #[must_use = "run state must be used"]
    pub async fn replace_container<R: DeployRuntime + ?Sized>(
        self,
        runtime: &R,
        routing: &RoutingSettings,
    ) -> Result<Run<Running>, DeployError> {
        let container_id = replace_container(runtime, &self.deployment, routing).await?;
        Ok(self.transition(Running { container_id }))
    }
}

impl Run<Running> {
    pub fn container_id(&self) -> &ContainerId {
        &self.state.container_id
    }

    pub fn finish(self) -> DeployOutcome {
        DeployOutcome {
            deployment: self.deployment,
            container_id: self.state.container_id,
            redeploy: self.redeploy,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// The deployment, with its project type updated if detected.
    pub deployment: Deployment,
    pub container_id: ContainerId,
    pub redeploy: bool,
}

// =============================================================================
// Pipeline driver
// =============================================================================

/// Settings the pipeline passes to its stages.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Image build command (`docker` or `podman`).
    pub build_tool: String,
    pub routing: RoutingSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            build_tool: "docker".to_string(),
            routing: RoutingSettings::default(),
        }
    }
}

/// Drives runs through every stage against shared collaborators.
#[derive(Clone)]
pub struct Pipeline {
    runtime: Arc<dyn DeployRuntime>,
    runner: Arc<dyn CommandRunner>,
    states: Arc<dyn StateStore>,
    events: EventBus,
    settings: PipelineSettings,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Emits the stage's event and passes the result through.
struct Reporter<'a> {
    events: &'a EventBus,
    id: DeploymentId,
    subdomain: String,
}

impl Reporter<'_> {
    fn stage<T>(&self, result: Result<T, DeployError>, message: &str) -> Result<T, DeployError> {
        match result {
            Ok(value) => {
                self.progress(message);
                Ok(value)
            }
            Err(e) => {
                self.error(&e.to_string());
                Err(e)
            }
        }
    }

    fn progress(&self, message: &str) {
        self.events
            .publish(DeployEvent::progress(&self.id, &self.subdomain, message));
    }

    fn error(&self, message: &str) {
        self.events
            .publish(DeployEvent::error(&self.id, &self.subdomain, message));
    }
}

impl Pipeline {
    pub fn new(
        runtime: Arc<dyn DeployRuntime>,
        runner: Arc<dyn CommandRunner>,
        states: Arc<dyn StateStore>,
        events: EventBus,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            runtime,
            runner,
            states,
            events,
            settings,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn states(&self) -> &Arc<dyn StateStore> {
        &self.states
    }

    pub fn runtime(&self) -> &Arc<dyn DeployRuntime> {
        &self.runtime
    }

    /// Register `deployment` in the state store and run it to completion.
    pub async fn run(
        &self,
        deployment: Deployment,
        redeploy: bool,
    ) -> Result<DeployOutcome, DeployError> {
        self.states.set_deploying(&deployment.id)?;
        self.execute(deployment, redeploy).await
    }

    /// Run every stage for a deployment already registered as Deploying.
    ///
    /// Fresh runs remove their state entry on success; redeploys are marked
    /// Completed. Failed runs are marked Failed with the error message.
    pub async fn execute(
        &self,
        deployment: Deployment,
        redeploy: bool,
    ) -> Result<DeployOutcome, DeployError> {
        let id = deployment.id.clone();
        let reporter = Reporter {
            events: &self.events,
            id: id.clone(),
            subdomain: deployment.subdomain.to_string(),
        };

        tracing::info!(
            "{}: starting {} of {}",
            id,
            if redeploy { "redeploy" } else { "deploy" },
            deployment.clone_url
        );

        match self.stages(&reporter, deployment, redeploy).await {
            Ok(outcome) => {
                let cleanup = if redeploy {
                    self.states
                        .set_status(&id, DeploymentStatus::Completed, SUCCESS_MESSAGE)
                } else {
                    self.states.delete(&id)
                };
                if let Err(e) = cleanup {
                    tracing::warn!("{}: status update failed: {}", id, e);
                    reporter.error("status update failed");
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Err(state_err) =
                    self.states
                        .set_status(&id, DeploymentStatus::Failed, &e.to_string())
                {
                    tracing::warn!("{}: status update failed: {}", id, state_err);
                }
                Err(e)
            }
        }
    }

    async fn stages(
        &self,
        reporter: &Reporter<'_>,
        deployment: Deployment,
        redeploy: bool,
    ) -> Result<DeployOutcome, DeployError> {
        let run = Run::new(deployment, redeploy);

        let fetched = run.fetch(self.runner.as_ref()).await;
        let message = match &fetched {
            Ok(r) if r.fetch_outcome() == FetchOutcome::Pulled => "codebase updated",
            _ => "codebase cloned",
        };
        let fetched = reporter.stage(fetched, message)?;

        let ready = match fetched.reuse_recipe() {
            Ok(ready) => {
                reporter.progress(RECIPE_REUSED_MESSAGE);
                ready
            }
            Err(fetched) => {
                let detected = fetched.detect();
                let message = match &detected {
                    Ok(r) => format!("service discovered: {}", r.project_type()),
                    Err(_) => String::new(),
                };
                let detected = reporter.stage(detected, &message)?;

                let ready = detected.synthesize().await;
                reporter.stage(ready, RECIPE_CREATED_MESSAGE)?
            }
        };

        let built = ready
            .build(self.runner.as_ref(), &self.settings.build_tool)
            .await;
        let built = reporter.stage(built, "docker image built")?;

        let running = built
            .replace_container(self.runtime.as_ref(), &self.settings.routing)
            .await;
        let running = reporter.stage(running, SUCCESS_MESSAGE)?;

        Ok(running.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::recipe::RECIPE_FILE;
    use crate::deploy::state_store::MemoryStateStore;
    use crate::deploy::testing::{Call, FakeRunner, FakeRuntime, deployment_in};
    use crate::deploy::{DeployErrorKind, EventKind};
    use crate::runtime::ContainerState;

    struct Harness {
        runtime: Arc<FakeRuntime>,
        runner: Arc<FakeRunner>,
        states: Arc<MemoryStateStore>,
        pipeline: Pipeline,
    }

    fn harness(runtime: FakeRuntime, runner: FakeRunner) -> Harness {
        let runtime = Arc::new(runtime);
        let runner = Arc::new(runner);
        let states = Arc::new(MemoryStateStore::default());
        let pipeline = Pipeline::new(
            runtime.clone(),
            runner.clone(),
            states.clone(),
            EventBus::default(),
            PipelineSettings::default(),
        );
        Harness {
            runtime,
            runner,
            states,
            pipeline,
        }
    }

    #[tokio::test]
    async fn fresh_deploy_runs_every_stage_and_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        let h = harness(
            FakeRuntime::new(),
            FakeRunner::new().with_clone_files(&[("go.mod", "module demo\n")]),
        );
        let mut events = h.pipeline.events().subscribe_to(&d.id);

        let outcome = h.pipeline.run(d.clone(), false).await.unwrap();

        assert_eq!(outcome.deployment.project_type, Some(ProjectType::Golang));
        assert!(h.states.get(&d.id).is_err());

        let recipe = std::fs::read_to_string(d.project_path.join(RECIPE_FILE)).unwrap();
        assert!(recipe.contains("CMD [\"./app\"]"));

        let programs: Vec<String> = h.runner.commands().iter().map(|c| c.program.clone()).collect();
        assert_eq!(programs, vec!["git", "docker"]);

        drop(h.pipeline);
        let mut lines = Vec::new();
        while let Some(event) = events.recv().await {
            assert_eq!(event.kind, EventKind::Progress);
            lines.push(event.to_string());
        }
        assert_eq!(
            lines,
            vec![
                "t3st01:demo:codebase cloned",
                "t3st01:demo:service discovered: golang",
                "t3st01:demo:docker file created",
                "t3st01:demo:docker image built",
                "t3st01:demo:deployment successful",
            ]
        );
    }

    #[tokio::test]
    async fn reused_recipe_emits_single_recipe_event() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        std::fs::create_dir_all(d.project_path.join(".git")).unwrap();
        std::fs::write(d.project_path.join(RECIPE_FILE), "FROM custom\n").unwrap();
        let h = harness(FakeRuntime::new(), FakeRunner::new());
        let mut events = h.pipeline.events().subscribe_to(&d.id);

        h.pipeline.run(d, false).await.unwrap();
        drop(h.pipeline);

        let mut messages = Vec::new();
        while let Some(event) = events.recv().await {
            messages.push(event.message);
        }
        assert_eq!(
            messages,
            vec![
                "codebase updated",
                RECIPE_REUSED_MESSAGE,
                "docker image built",
                SUCCESS_MESSAGE,
            ]
        );
    }

    #[tokio::test]
    async fn redeploy_regenerates_existing_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        std::fs::create_dir_all(d.project_path.join(".git")).unwrap();
        std::fs::write(d.project_path.join("index.js"), "").unwrap();
        std::fs::write(d.project_path.join(RECIPE_FILE), "FROM stale\n").unwrap();
        let h = harness(FakeRuntime::new(), FakeRunner::new());

        let outcome = h.pipeline.run(d.clone(), true).await.unwrap();

        assert_eq!(outcome.deployment.project_type, Some(ProjectType::Node));
        let recipe = std::fs::read_to_string(d.project_path.join(RECIPE_FILE)).unwrap();
        assert!(!recipe.contains("stale"));
        assert_eq!(
            h.states.get(&d.id).unwrap().status,
            DeploymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn existing_recipe_is_reused_without_redeploy() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        std::fs::create_dir_all(d.project_path.join(".git")).unwrap();
        std::fs::write(d.project_path.join(RECIPE_FILE), "FROM custom\n").unwrap();
        let h = harness(FakeRuntime::new(), FakeRunner::new());

        let outcome = h.pipeline.run(d.clone(), false).await.unwrap();

        assert_eq!(outcome.deployment.project_type, None);
        let recipe = std::fs::read_to_string(d.project_path.join(RECIPE_FILE)).unwrap();
        assert_eq!(recipe, "FROM custom\n");
    }

    #[tokio::test]
    async fn build_failure_skips_container_stage_and_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        let h = harness(
            FakeRuntime::new(),
            FakeRunner::new()
                .with_clone_files(&[("index.js", "")])
                .fail("docker"),
        );
        let mut events = h.pipeline.events().subscribe_to(&d.id);

        let err = h.pipeline.run(d.clone(), false).await.unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::BuildFailed);
        assert!(!h.runtime.calls().iter().any(|c| matches!(c, Call::Create(_))));
        assert_eq!(h.states.get(&d.id).unwrap().status, DeploymentStatus::Failed);

        let mut last = events.recv().await.unwrap();
        while last.kind != EventKind::Error {
            last = events.recv().await.unwrap();
        }
        assert!(last.to_string().starts_with("t3st01:demo:"));
    }

    #[tokio::test]
    async fn missing_marker_is_service_discovery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        let h = harness(FakeRuntime::new(), FakeRunner::new());

        let mut events = h.pipeline.events().subscribe_to(&d.id);

        let err = h.pipeline.run(d, false).await.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::ServiceDiscoveryFailed);
        assert_eq!(h.runner.commands().len(), 1);

        drop(h.pipeline);
        let mut kinds = Vec::new();
        while let Some(event) = events.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(kinds, vec![EventKind::Progress, EventKind::Error]);
    }

    #[tokio::test]
    async fn recipe_write_failure_is_reported_after_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        std::fs::create_dir_all(d.project_path.join(".git")).unwrap();
        std::fs::write(d.project_path.join("index.js"), "").unwrap();
        // A directory where the recipe belongs makes the write fail.
        std::fs::create_dir_all(d.project_path.join(RECIPE_FILE).join("keep")).unwrap();
        let h = harness(FakeRuntime::new(), FakeRunner::new());
        let mut events = h.pipeline.events().subscribe_to(&d.id);

        let err = h.pipeline.run(d, true).await.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::RecipeFailed);
        assert_eq!(h.runner.commands().len(), 1);

        drop(h.pipeline);
        let mut messages = Vec::new();
        while let Some(event) = events.recv().await {
            messages.push((event.kind, event.message));
        }
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1],
            (EventKind::Progress, "service discovered: node".to_string())
        );
        assert_eq!(messages[2].0, EventKind::Error);
        assert!(messages[2].1.contains("build recipe"));
    }

    #[tokio::test]
    async fn second_run_while_deploying_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        let h = harness(FakeRuntime::new(), FakeRunner::new());

        h.states.set_deploying(&d.id).unwrap();
        let err = h.pipeline.run(d, false).await.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::StateConflict);
        assert!(h.runner.commands().is_empty());
    }

    #[tokio::test]
    async fn failed_run_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let d = deployment_in(dir.path());
        let runtime = FakeRuntime::new().with_container(d.container_name(), ContainerState::Running);
        let h = harness(runtime, FakeRunner::new().fail("git"));

        assert!(h.pipeline.run(d.clone(), false).await.is_err());
        assert_eq!(h.states.get(&d.id).unwrap().status, DeploymentStatus::Failed);
        // Failed entries are not held, so the next attempt registers again.
        assert!(h.states.set_deploying(&d.id).is_ok());
    }
}
