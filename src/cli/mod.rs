pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::branch::BranchAction;
use commands::config::ConfigAction;
use commands::pr::PrCommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bbsctl")]
#[command(about = "Branch and pull-request automation for Bitbucket Server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Branch lifecycle management
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Pull request management
    Pr {
        #[command(subcommand)]
        action: PrCommand,
    },

    /// Apply a declarative manifest of branches and pull requests
    Apply {
        /// Path to the TOML manifest
        manifest: PathBuf,

        /// Show what would change without calling the server
        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Interactive setup wizard
    Setup {
        /// Force reconfiguration if already configured
        #[arg(long)]
        force: bool,
    },

    /// Check configuration and server connectivity
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::Branch { action } => commands::branch::run(action).await,
            Commands::Pr { action } => commands::pr::run(action).await,
            Commands::Apply { manifest, dry_run } => commands::apply::run(&manifest, dry_run).await,
            Commands::Config { action } => commands::config::run(action).await,
            Commands::Setup { force } => commands::setup::run(force).await,
            Commands::Doctor => commands::doctor::run().await,
            Commands::Completions { shell } => commands::completions::run(shell),
            Commands::Version => commands::version::run().await,
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
