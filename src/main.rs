use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cmd;

#[derive(Parser)]
#[command(name = "usher")]
#[command(version, about = "Phase-driven project workflow manager")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new usher project in this directory
    Init {
        /// Project type (see 'usher types')
        #[arg(short = 't', long)]
        project_type: Option<String>,
    },
    /// Start the workflow for a new project run
    Start {
        /// Project name
        name: Vec<String>,
    },
    Status,
    /// Opt in to an optional phase
    Enable { phase: String },
    /// Opt out of an optional phase
    Skip { phase: String },
    /// Advance past the active phase once its completion criteria hold
    Complete,
    /// Manage implementation tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage phase artifacts
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
    /// Record review outcomes and reopen failed work
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Set a checklist field on the active phase
    Set { field: String, value: String },
    /// List registered project types and their phases
    Types,
    Reset {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task to the implementation backlog
    Add {
        #[arg(required = true)]
        name: Vec<String>,
    },
    /// Mark a task as done
    Done { id: u32 },
    List,
}

#[derive(Subcommand)]
pub enum ArtifactCommands {
    /// Register an artifact path with the active phase
    Add { path: String },
    /// Approve a registered artifact
    Approve { path: String },
    List,
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Record the outcome of a review round (pass or fail)
    Record {
        assessment: String,
        #[arg(short, long)]
        summary: Option<String>,
    },
    /// Send a failed review back to implementation
    Reopen,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init { project_type } => {
            cmd::cmd_init(&project_dir, project_type.as_deref())?;
        }
        Commands::Start { name } => cmd::cmd_start(&project_dir, name)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Enable { phase } => cmd::cmd_enable(&project_dir, phase)?,
        Commands::Skip { phase } => cmd::cmd_skip(&project_dir, phase)?,
        Commands::Complete => cmd::cmd_complete(&project_dir)?,
        Commands::Task { command } => cmd::cmd_task(&project_dir, command)?,
        Commands::Artifact { command } => cmd::cmd_artifact(&project_dir, command)?,
        Commands::Review { command } => cmd::cmd_review(&project_dir, command)?,
        Commands::Set { field, value } => cmd::cmd_set(&project_dir, field, value)?,
        Commands::Types => cmd::cmd_types()?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, *force)?,
    }

    Ok(())
}
