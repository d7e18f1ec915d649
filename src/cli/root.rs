use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use super::plan::PlanCommand;
use super::replay::ReplayCommand;
use super::schema::SchemaCommand;
use super::state::StateCommand;
use auditview::config::Config;

/// auditview - view-state engine for paginated audit lists
#[derive(Parser)]
#[command(
    name = "auditview",
    version,
    about = "Inspect and exercise the list view-state engine",
    long_about = r#"auditview drives the view state behind the devices, security-issues and reports lists:
pagination windows, persisted state validation, schemas and scripted event replays.

Examples:
  auditview plan --current 5 --total 10            # Print the pager's page window
  auditview state devices saved.json               # Validate a persisted view state
  auditview schema view-state --pretty             # JSON schema for the view state
  auditview replay security-issues session.json    # Replay a scripted session"#
)]
pub struct Cli {
    /// Configuration file (defaults to the usual search locations)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the page window for a position in a result set
    Plan(PlanCommand),

    /// Validate and normalize a persisted view state
    State(StateCommand),

    /// Generate JSON schemas
    Schema(SchemaCommand),

    /// Replay a timed script of view commands
    Replay(ReplayCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        let config = Config::init(self.config.as_deref())
            .await
            .context("Failed to load configuration")?;
        debug!(?config, "Configuration initialized");

        match self.command {
            Commands::Plan(cmd) => cmd.execute(&config),
            Commands::State(cmd) => cmd.execute(&config).await,
            Commands::Schema(cmd) => cmd.execute().await,
            Commands::Replay(cmd) => cmd.execute(&config).await,
        }
    }
}
