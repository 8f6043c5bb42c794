// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Deploy git repositories as routable containers on Docker or Podman")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Orchestrator config file (default: skiff.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a deployment.yml template
    Init {
        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,

        /// Subdomain to route to the deployment
        #[arg(long)]
        subdomain: Option<String>,

        /// Repository to deploy
        #[arg(long)]
        clone_url: Option<String>,
    },

    /// Fetch, build and start the deployment described by a manifest
    Deploy {
        /// Manifest path (default: deployment.yml in the current directory)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Reuse an existing working copy and recipe
        #[arg(long)]
        redeploy: bool,
    },

    /// Show resource usage of a deployment's container
    Stats {
        /// Deployment id
        id: String,
    },

    /// Show a deployment's container logs
    Logs {
        /// Deployment id
        id: String,

        /// Stream new lines until the follow timeout elapses
        #[arg(short, long)]
        follow: bool,
    },

    /// Print the project type detected in a directory
    Detect {
        /// Project directory
        path: PathBuf,
    },
}
