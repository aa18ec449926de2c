//! Loader context
//!
//! Owns the plugin directory location and the scratch directory that holds
//! generated source copies and compiled modules.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::error::EnvironmentError;

const SCRATCH_PREFIX: &str = "hotloop-";

/// Process-wide state for one hot-reload cycle.
///
/// The scratch directory exists from [`LoaderContext::initialize`] until
/// [`LoaderContext::teardown`] (or drop), and is removed exactly once.
#[derive(Debug)]
pub struct LoaderContext {
    plugins_dir: PathBuf,
    scratch: TempDir,
}

impl LoaderContext {
    /// Resolve the plugin directory against the working directory and create
    /// a fresh scratch directory.
    pub fn initialize(config: &LoaderConfig) -> Result<Self, EnvironmentError> {
        let cwd = std::env::current_dir()
            .map_err(|source| EnvironmentError::WorkingDirectory { source })?;
        Self::with_plugins_dir(cwd.join(&config.plugins_dir), config.scratch_root.as_deref())
    }

    /// Build a context for an explicit plugin directory.
    ///
    /// `scratch_root` is the parent for the scratch directory; the system temp
    /// dir is used when `None`.
    pub fn with_plugins_dir<P: Into<PathBuf>>(
        plugins_dir: P,
        scratch_root: Option<&Path>,
    ) -> Result<Self, EnvironmentError> {
        let plugins_dir = plugins_dir.into();

        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let scratch = match scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| EnvironmentError::ScratchDirectory { source })?;

        info!(
            "Loader initialized: plugins {:?}, objects {:?}",
            plugins_dir,
            scratch.path()
        );

        Ok(Self {
            plugins_dir,
            scratch,
        })
    }

    /// Directory scanned for plugin sources
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Scratch directory for generated artifacts
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory and everything in it.
    ///
    /// Failures are logged and swallowed so shutdown always proceeds.
    pub fn teardown(self) {
        let path = self.scratch.path().to_path_buf();
        match self.scratch.close() {
            Ok(()) => debug!("Removed objects dir {:?}", path),
            Err(e) => warn!("Failed to remove objects dir {:?}: {}", path, e),
        }
    }
}
