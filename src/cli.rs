use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::platform::DEFAULT_OS_RELEASE;

/// Editor environment provisioner
///
/// edenv installs the packages, plugin manager, editor config and linters
/// described by a plan (`edenv.toml`) and keeps a managed block of
/// environment exports in your shell profile. Re-running replaces the block
/// instead of appending a new one.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default plan and editor config
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Run every step of the plan
    ///
    /// Skips (successfully) on hosts that are not Debian-based.
    Provision {
        /// Plan file (defaults to $XDG_CONFIG_HOME/edenv/edenv.toml)
        #[arg(short, long, value_name = "PLAN")]
        plan: Option<PathBuf>,

        /// OS release descriptor used for the distribution check
        #[arg(long, value_name = "PATH", env = "EDENV_OS_RELEASE", default_value = DEFAULT_OS_RELEASE)]
        os_release: PathBuf,
    },

    /// Remove the managed block and trailing blank lines from the profile
    Reset {
        /// Plan file naming the profile
        #[arg(short, long, value_name = "PLAN", conflicts_with = "profile")]
        plan: Option<PathBuf>,

        /// Profile file to clean directly
        #[arg(long, value_name = "PROFILE")]
        profile: Option<PathBuf>,
    },

    /// Print the export block the plan would write
    Env {
        /// Plan file (defaults to $XDG_CONFIG_HOME/edenv/edenv.toml)
        #[arg(short, long, value_name = "PLAN")]
        plan: Option<PathBuf>,
    },

    /// Validate the plan
    Check {
        /// Plan file (defaults to $XDG_CONFIG_HOME/edenv/edenv.toml)
        #[arg(short, long, value_name = "PLAN")]
        plan: Option<PathBuf>,
    },

    /// Show what the last successful run installed
    Status {
        /// Show the receipt of a single download
        #[arg(value_name = "DOWNLOAD")]
        name: Option<String>,
    },
}
