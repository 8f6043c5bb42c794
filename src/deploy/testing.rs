// ABOUTME: In-crate fakes for the runtime traits and the command runner.
// ABOUTME: Record every call so tests can assert ordering and short-circuiting.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, LogError, LogLine, LogOps, LogOptions, NetworkConfig, NetworkError,
    NetworkOps, RuntimeInfo, RuntimeInfoError, RuntimeMetadata, StatsError, StatsOps,
    StatsSnapshot,
};
use crate::types::{ContainerId, DeploymentId, NetworkId, Subdomain};

use super::Deployment;
use super::command::{CommandOutput, CommandRunner, CommandSpec};

pub fn sample_deployment() -> Deployment {
    deployment_in(Path::new("/projects"))
}

pub fn deployment_in(base: &Path) -> Deployment {
    Deployment::new(
        DeploymentId::new("t3st01").unwrap(),
        Subdomain::new("demo").unwrap(),
        "https://example.com/demo.git",
        base,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Inspect(String),
    Remove(String),
    Create(String),
    Start(String),
    CreateNetwork(String),
    List(Option<String>),
    Stats(String),
    Logs(String),
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, (String, ContainerState)>,
    networks: HashSet<String>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
    fail_remove: bool,
    fail_inspect: bool,
    fail_start: bool,
    stats: StatsSnapshot,
    raw_logs: Bytes,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a container named `name` running `<name>-image`.
    pub fn with_container(self, name: &str, state: ContainerState) -> Self {
        self.state
            .lock()
            .containers
            .insert(name.to_string(), (format!("{}-image", name), state));
        self
    }

    pub fn with_stats(mut self, stats: StatsSnapshot) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_raw_logs(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw_logs = raw.into();
        self
    }

    pub fn fail_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn fail_inspect(mut self) -> Self {
        self.fail_inspect = true;
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "Fake".to_string(),
            version: "0".to_string(),
            api_version: "0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        self.record(Call::Create(config.name.clone()));
        let mut state = self.state.lock();
        if state.containers.contains_key(&config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        state.containers.insert(
            config.name.clone(),
            (config.image.clone(), ContainerState::Created),
        );
        Ok(ContainerId::new(config.name.clone()))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.record(Call::Start(id.to_string()));
        if self.fail_start {
            return Err(ContainerError::Runtime("start refused".to_string()));
        }
        let mut state = self.state.lock();
        let entry = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        entry.1 = ContainerState::Running;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        self.record(Call::Remove(id.to_string()));
        if self.fail_remove {
            return Err(ContainerError::Runtime("device busy".to_string()));
        }
        self.state
            .lock()
            .containers
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        self.record(Call::Inspect(id.to_string()));
        if self.fail_inspect {
            return Err(ContainerError::Runtime("daemon unavailable".to_string()));
        }
        let state = self.state.lock();
        let (image, container_state) = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        Ok(ContainerInfo {
            id: id.clone(),
            name: id.to_string(),
            image: image.clone(),
            state: *container_state,
            labels: HashMap::new(),
            networks: Vec::new(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.record(Call::List(filters.name.clone()));
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|(_, (_, s))| filters.all || *s == ContainerState::Running)
            .filter(|(name, _)| filters.name.as_ref().is_none_or(|n| name.contains(n.as_str())))
            .map(|(name, (image, s))| ContainerSummary {
                id: ContainerId::new(name.clone()),
                name: name.clone(),
                image: image.clone(),
                state: format!("{:?}", s).to_lowercase(),
                status: String::new(),
                labels: HashMap::new(),
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        self.record(Call::CreateNetwork(config.name.clone()));
        if !self.state.lock().networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        Ok(NetworkId::new(config.name.clone()))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.contains(name))
    }
}

#[async_trait]
impl StatsOps for FakeRuntime {
    async fn container_stats(&self, id: &ContainerId) -> Result<StatsSnapshot, StatsError> {
        self.record(Call::Stats(id.to_string()));
        Ok(self.stats.clone())
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn raw_logs(&self, id: &ContainerId, _opts: &LogOptions) -> Result<Bytes, LogError> {
        self.record(Call::Logs(id.to_string()));
        if !self.state.lock().containers.contains_key(id.as_str()) {
            return Err(LogError::ContainerNotFound(id.to_string()));
        }
        Ok(self.raw_logs.clone())
    }

    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        self.record(Call::Logs(id.to_string()));
        Ok(Box::pin(futures::stream::pending()))
    }
}

/// Command runner that records invocations instead of spawning processes.
#[derive(Default)]
pub struct FakeRunner {
    commands: Mutex<Vec<CommandSpec>>,
    clone_files: Vec<(String, String)>,
    fail_program: Option<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files that `git clone` leaves in the target directory.
    pub fn with_clone_files(mut self, files: &[(&str, &str)]) -> Self {
        self.clone_files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self
    }

    /// Make every invocation of `program` exit non-zero.
    pub fn fail(mut self, program: &str) -> Self {
        self.fail_program = Some(program.to_string());
        self
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.commands.lock().push(cmd.clone());

        if self.fail_program.as_deref() == Some(cmd.program.as_str()) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("{} failed\n", cmd.program),
            });
        }

        if cmd.program == "git" && cmd.args.first().map(String::as_str) == Some("clone") {
            if let Some(target) = cmd.args.last() {
                let target = PathBuf::from(target);
                std::fs::create_dir_all(target.join(".git"))?;
                for (path, contents) in &self.clone_files {
                    let file = target.join(path);
                    if let Some(parent) = file.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(file, contents)?;
                }
            }
        }

        Ok(CommandOutput::default())
    }
}
