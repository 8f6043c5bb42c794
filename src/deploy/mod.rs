// ABOUTME: Deployment orchestration: state registry, pipeline stages and read paths.
// ABOUTME: Exports the pipeline, its collaborators and the service facade.

mod build;
mod command;
mod container;
mod deployment;
mod detect;
mod dispatch;
mod error;
mod events;
mod fetch;
mod logs;
mod metrics;
mod pipeline;
mod recipe;
mod service;
mod state;
mod state_store;
mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use build::{build_command, build_image};
pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use container::{
    RoutingSettings, container_config, ensure_network, remove_existing, replace_container,
    routing_labels,
};
pub use deployment::{DEFAULT_PORT, Deployment, EnvVar, validate_env_key};
pub use detect::{MARKERS, ProjectType, detect_project_type};
pub use dispatch::{DEFAULT_MAX_CONCURRENT, Dispatcher};
pub use error::{ContainerErrorExt, DeployError, DeployErrorKind};
pub use events::{DEFAULT_CAPACITY, DeployEvent, EventBus, EventKind, EventSubscription};
pub use fetch::{FetchOutcome, fetch_command, fetch_source};
pub use logs::{DEFAULT_FOLLOW_TIMEOUT, DEFAULT_TAIL, HEADER_LEN, demux_logs, follow_logs, get_logs};
pub use metrics::{ContainerStats, STOPPED, collect_stats, compute, cpu_percent};
pub use pipeline::{
    DeployOutcome, Detected, Fetched, ImageBuilt, Pipeline, PipelineSettings, RecipeReady,
    Registered, Run, Running, SUCCESS_MESSAGE,
};
pub use recipe::{RECIPE_FILE, RecipeParams, recipe_exists, render_recipe, start_command, write_recipe};
pub use service::{DeployService, NewDeployment};
pub use state::{DEPLOYING_MESSAGE, DeploymentState, DeploymentStatus, Lease};
pub use state_store::{DEFAULT_LEASE_TTL, MemoryStateStore, StateStore};
pub use store::{DeploymentStore, MemoryDeploymentStore};
