//! Hotloop CLI - run plugin sources in a hot-reload loop

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hotloop_plugins::LoaderConfig;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = LoaderConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.plugins_dir {
        config.plugins_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::run::run(config))
        }
        Commands::Once => commands::once::run(&config),
        Commands::New { name } => commands::new::run(&config, &name),
    }
}
