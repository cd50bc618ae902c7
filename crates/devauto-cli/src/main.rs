//! devauto - dev environment automation CLI

mod commands;
mod selector;

use clap::{Parser, Subcommand};
use devauto_config::GlobalConfig;
use devauto_core::WorkspaceOverrides;
use mimalloc::MiMalloc;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "devauto")]
#[command(author, version, about = "Dev Environment Automation Runner", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Path to devcontainer.json (relative to the workspace)
    #[arg(long, global = true)]
    devcontainer: Option<PathBuf>,

    /// Path to the automation manifest (relative to the workspace)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check devcontainer.json and the automation manifest for problems
    Validate {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List automation tasks
    List,

    /// List forwarded ports with their labels
    Ports,

    /// Show the tasks that would run, in order, without running them
    Plan {
        /// Plan the postDevcontainerStart tasks
        #[arg(long, conflicts_with = "tasks")]
        start: bool,
        /// Tasks to plan (with their dependencies)
        tasks: Vec<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the postDevcontainerStart tasks
    Start {
        /// Maximum number of tasks running at once
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
        /// Stop starting new tasks after the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Run tasks by id (interactive selection if none given)
    Run {
        /// Task ids
        tasks: Vec<String>,
        /// Maximum number of tasks running at once
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
        /// Stop starting new tasks after the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Show or edit global configuration
    Config {
        /// Open config in editor
        #[arg(short, long)]
        edit: bool,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Handle config command separately (doesn't need a workspace)
    if let Commands::Config { edit } = &cli.command {
        commands::config(*edit)?;
        return Ok(true);
    }

    let config = match GlobalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring global config: {}", e);
            GlobalConfig::default()
        }
    };

    let overrides = WorkspaceOverrides {
        devcontainer: cli.devcontainer,
        manifest: cli.manifest,
    };
    let workspace = commands::load_workspace(&cli.workspace, &overrides)?;

    match cli.command {
        Commands::Validate { json } => commands::validate(&workspace, json),
        Commands::List => {
            commands::list(&workspace)?;
            Ok(true)
        }
        Commands::Ports => {
            commands::ports(&workspace);
            Ok(true)
        }
        Commands::Plan { start, tasks, json } => {
            commands::plan(&workspace, start, tasks, json)?;
            Ok(true)
        }
        Commands::Start { jobs, fail_fast } => {
            let options = commands::runner_options(&config, jobs, fail_fast);
            commands::start(&workspace, options).await
        }
        Commands::Run {
            tasks,
            jobs,
            fail_fast,
        } => {
            let tasks = if tasks.is_empty() {
                let manifest = workspace.require_manifest()?;
                selector::select_tasks(manifest, "Select tasks to run:")?
            } else {
                tasks
            };
            let options = commands::runner_options(&config, jobs, fail_fast);
            commands::run_tasks(&workspace, tasks, options).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}
