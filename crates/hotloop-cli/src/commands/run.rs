//! `hotloop run` command implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use hotloop_plugins::{LoaderConfig, LoaderContext, PluginCycle};
use tracing::{info, warn};

/// Exit status after a second signal, as for a shell job killed by SIGINT
const FORCED_EXIT_CODE: i32 = 130;

/// Execute the `run` command: loop until SIGINT or SIGTERM, then remove the
/// scratch directory.
///
/// A plugin that never returns keeps the first signal waiting. A second
/// signal removes the scratch directory and exits without joining it.
pub async fn run(config: LoaderConfig) -> anyhow::Result<()> {
    let ctx = LoaderContext::initialize(&config).context("failed to initialize loader")?;
    info!("Watching {}", ctx.plugins_dir().display());
    let scratch = ctx.scratch_dir().to_path_buf();

    let cycle = PluginCycle::new(ctx, &config);
    let stop = Arc::new(AtomicBool::new(false));

    let mut worker = {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            let passes = cycle.run_until(&stop);
            (cycle, passes)
        })
    };

    shutdown_signal().await;
    stop.store(true, Ordering::Relaxed);
    info!("Waiting for the current plugin to finish, press Ctrl+C again to force exit");

    tokio::select! {
        joined = &mut worker => {
            let (cycle, passes) = joined.context("plugin cycle panicked")?;
            info!("Stopped after {} passes", passes);
            cycle.into_context().teardown();
            Ok(())
        }
        _ = shutdown_signal() => {
            warn!("Forcing exit while a plugin is still running");
            if let Err(e) = std::fs::remove_dir_all(&scratch) {
                warn!("Failed to remove scratch dir {}: {}", scratch.display(), e);
            }
            std::process::exit(FORCED_EXIT_CODE);
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
