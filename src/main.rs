// ABOUTME: Entry point for the skiff CLI application.
// ABOUTME: Parses arguments, wires the orchestrator and dispatches to command handlers.

mod cli;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use output::{Output, OutputMode};
use skiff::config::{self, Config, Manifest};
use skiff::deploy::{
    ContainerStats, DeployService, Dispatcher, EventBus, MemoryDeploymentStore,
    MemoryStateStore, Pipeline, ProcessRunner, collect_stats, detect_project_type, follow_logs,
    get_logs,
};
use skiff::error::Result;
use skiff::runtime::{BollardRuntime, RuntimeInfo, connect_local};
use skiff::types::DeploymentId;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    if let Err(e) = run(cli, output.clone()).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init {
            force,
            subdomain,
            clone_url,
        } => {
            config::init_manifest(&cwd, subdomain.as_deref(), clone_url.as_deref(), force)?;
            output.success(&format!("Wrote {}", config::MANIFEST_FILENAME));
            Ok(())
        }
        Commands::Detect { path } => {
            let project_type = detect_project_type(&path)?;
            output.line(project_type.as_str());
            Ok(())
        }
        Commands::Deploy { file, redeploy } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let manifest = match file {
                Some(path) => Manifest::load(&path)?,
                None => Manifest::discover(&cwd)?,
            };
            output.start_timer();
            deploy(&config, &manifest, redeploy, &output).await
        }
        Commands::Stats { id } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let id = DeploymentId::new(&id)?;
            let runtime = connect(&config).await?;
            let stats = collect_stats(&runtime, &id).await?;
            output.value("stats", &stats, render_stats);
            Ok(())
        }
        Commands::Logs { id, follow } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let id = DeploymentId::new(&id)?;
            let runtime = connect(&config).await?;
            if follow {
                follow_logs(&runtime, &id, config.logs.follow_timeout, |line| {
                    output.line(&line.content)
                })
                .await?;
            } else {
                for line in get_logs(&runtime, &id, config.logs.tail).await? {
                    output.line(line.trim_end());
                }
            }
            Ok(())
        }
    }
}

fn load_config(explicit: Option<&std::path::Path>, cwd: &std::path::Path) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}

async fn connect(config: &Config) -> Result<BollardRuntime> {
    let runtime = connect_local(&config.runtime_config()).await?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        match runtime.info().await {
            Ok(info) => tracing::debug!(
                "connected to {} {} (API {}, {}/{})",
                info.name,
                info.version,
                info.api_version,
                info.os,
                info.arch
            ),
            Err(e) => tracing::debug!(
                "connected to {}, info unavailable: {}",
                runtime.runtime_type(),
                e
            ),
        }
    }
    Ok(runtime)
}

/// Register the manifest's deployment and run the pipeline in this process.
async fn deploy(config: &Config, manifest: &Manifest, redeploy: bool, output: &Output) -> Result<()> {
    let runtime = connect(config).await?;
    let settings = config.pipeline_settings(runtime.runtime_type());

    let pipeline = Pipeline::new(
        Arc::new(runtime),
        Arc::new(ProcessRunner::new(output.mode().echoes_commands())),
        Arc::new(MemoryStateStore::new(config.lease_ttl)),
        EventBus::new(config.events.capacity),
        settings,
    );
    let service = DeployService::new(
        Arc::new(MemoryDeploymentStore::new()),
        pipeline,
        Dispatcher::new(config.max_concurrent_runs),
        &config.projects_dir,
    )
    .with_log_tail(config.logs.tail);

    let deployment = service.register(manifest.to_new_deployment()?)?;
    output.progress(&format!(
        "Deploying {} as {} ({})",
        deployment.clone_url, deployment.id, deployment.subdomain
    ));

    let mut events = service.subscribe_to(&deployment.id);
    let printer = {
        let output = output.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                output.event(&event);
            }
        })
    };

    let result = service.deploy_now(&deployment.id, redeploy).await;

    // Closing the bus ends the printer once buffered events are drained.
    drop(service);
    if let Err(e) = printer.await {
        tracing::warn!("event printer stopped: {}", e);
    }

    let outcome = result?;
    output.success(&format!(
        "Deployed {} at {}.{}",
        outcome.deployment.id, outcome.deployment.subdomain, config.proxy.domain
    ));
    Ok(())
}

fn render_stats(stats: &ContainerStats) -> String {
    format!(
        "status: {}\ncpu: {:.2}%\nmemory: {} / {} bytes\nnetwork: rx {} bytes, tx {} bytes",
        stats.status,
        stats.cpu_percent,
        stats.memory_usage,
        stats.memory_limit,
        stats.network_rx,
        stats.network_tx
    )
}
