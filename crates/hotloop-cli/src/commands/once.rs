//! `hotloop once` command implementation

use anyhow::Context;
use colored::Colorize;
use hotloop_plugins::{LoaderConfig, LoaderContext, PluginCycle};

/// Execute the `once` command: a single pass, failing if any plugin failed
pub fn run(config: &LoaderConfig) -> anyhow::Result<()> {
    let ctx = LoaderContext::initialize(config).context("failed to initialize loader")?;
    let cycle = PluginCycle::new(ctx, config);

    let report = cycle.run_pass();
    cycle.into_context().teardown();

    let failed = report.len() - report.succeeded();
    if failed > 0 {
        anyhow::bail!("{} of {} plugins failed", failed, report.len());
    }

    println!(
        "{} {} plugins ran",
        "✓".green(),
        report.succeeded()
    );
    Ok(())
}
