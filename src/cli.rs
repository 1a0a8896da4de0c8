use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::api::ObjectKey;

#[derive(Parser)]
#[command(name = "ksvc")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Register Keystone services and endpoints from declared objects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/ksvc/config.toml)
    #[arg(long, global = true, env = "KSVC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Object store directory (overrides the config file)
    #[arg(long, global = true, env = "KSVC_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile one service now
    Reconcile {
        /// Service to reconcile, as <namespace>/<name>
        key: ObjectKey,
    },

    /// Show what reconcile would change, without changing anything
    Plan {
        /// Service to plan, as <namespace>/<name>
        key: ObjectKey,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the controller loop
    Run {
        /// Only reconcile services in this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Reconcile every service once and exit
        #[arg(long)]
        once: bool,
    },

    /// Show stored services and their recorded service IDs
    Status {
        /// Only this service, as <namespace>/<name>
        key: Option<ObjectKey>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
