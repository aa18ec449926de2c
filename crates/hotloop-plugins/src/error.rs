//! Typed errors for the hot-reload cycle.
//!
//! Only [`EnvironmentError`] is fatal. Everything else is scoped to a single
//! plugin and is reported by the cycle before it moves on.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Startup failures. The process cannot run without a working directory and
/// a scratch directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// The current working directory could not be resolved.
    #[error("could not find current directory: {source}")]
    WorkingDirectory {
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory for generated sources and modules could not be created.
    #[error("could not create objects dir: {source}")]
    ScratchDirectory {
        #[source]
        source: std::io::Error,
    },
}

/// Failures while listing the plugin directory.
///
/// Never fatal: discovery logs these and yields an empty pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The plugin directory could not be opened.
    #[error("open plugins dir {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry of the plugin directory could not be read.
    #[error("read dir names in {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures turning a plugin source into a loadable module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// The plugin source could not be read from the plugin directory.
    #[error("could not read {plugin}: {source}")]
    SourceRead {
        plugin: String,
        #[source]
        source: std::io::Error,
    },

    /// The source copy could not be written into the scratch directory.
    #[error("could not write {path}: {source}")]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured compiler program is not on `PATH`.
    #[error("compiler {program} not found: {source}")]
    ToolchainNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    /// The compiler process could not be started or waited on.
    #[error("could not launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran and exited unsuccessfully.
    #[error("compiler {status}")]
    Failed { plugin: String, status: ExitStatus },

    /// The compiler exceeded the configured timeout and was killed.
    #[error("compiler timed out after {timeout:?}")]
    TimedOut { plugin: String, timeout: Duration },
}

/// Failures loading or running a compiled module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvokeError {
    /// The file is not a loadable module for this process.
    #[error("could not open {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The module does not export the entry symbol.
    #[error("could not find {symbol} function: {source}")]
    SymbolNotFound {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// The module exports the entry symbol with a different call shape.
    #[error("found {symbol} but type is {actual} instead of {expected}")]
    SignatureMismatch {
        symbol: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The entry point ran and reported a failure.
    #[error("plugin failed with error {0}")]
    Run(String),
}

/// A per-plugin failure annotated with the plugin name and the stage it
/// failed in. Its `Display` is the diagnostic line for one plugin in one pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CycleError {
    #[error("could not compile {plugin}: {source}")]
    Compile {
        plugin: String,
        #[source]
        source: CompileError,
    },

    #[error("could not run {plugin}: {source}")]
    Invoke {
        plugin: String,
        #[source]
        source: InvokeError,
    },
}

impl CycleError {
    /// Name of the plugin that failed.
    pub fn plugin(&self) -> &str {
        match self {
            Self::Compile { plugin, .. } | Self::Invoke { plugin, .. } => plugin,
        }
    }

    /// Stage label used in structured log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "compile",
            Self::Invoke { .. } => "run",
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Config parsing error: {0}")]
    Parse(#[from] config::ConfigError),
}
