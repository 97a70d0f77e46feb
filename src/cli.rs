//! Command-line interface for candock
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Default settings file, optional when absent
pub const DEFAULT_SETTINGS: &str = "candock.toml";

/// candock - per-vehicle virtual CAN launcher
#[derive(Parser)]
#[command(name = "candock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Vehicle identity
    #[arg(long, env = "VEHICLE_ID", global = true)]
    pub vehicle_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Download, provision CAN channels, run agent and playback, clean up
    Launch {
        /// Use the package already present under the sim root
        #[arg(long)]
        skip_download: bool,
    },

    /// Provision CAN channels and write mapping/config, leaving channels up
    Setup,

    /// Print the channel name derived for a logical interface
    Derive {
        /// Logical interface name (e.g., vcan0)
        logical: String,

        /// Nonce mixed into the hash
        #[arg(long, default_value = "")]
        nonce: String,
    },

    /// Show the rewritten config and mapping without touching the host
    Rewrite {
        /// Nonce mixed into the hash
        #[arg(long, default_value = "")]
        nonce: String,
    },

    /// Look up the provisioned channel for a logical interface
    Resolve {
        /// Logical interface name
        logical: String,
    },

    /// Validate settings and the vehicle config
    Check,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings path and whether it was requested explicitly
    pub fn settings_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS), false),
        }
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "candock", &mut std::io::stdout());
    }
}
