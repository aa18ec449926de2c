//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hotloop - compile and run plugin sources in a loop
#[derive(Parser)]
#[command(name = "hotloop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (toml, json or yaml)
    #[arg(short = 'c', long, global = true, env = "HOTLOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Plugin source directory, overriding the configuration
    #[arg(short = 'p', long, global = true)]
    pub plugins_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Compile and run every plugin, repeatedly, until interrupted
    Run,

    /// Run a single pass over the plugins; fails if any plugin fails
    Once,

    /// Create a new plugin source from the template
    New {
        /// Plugin name (file stem)
        name: String,
    },
}
