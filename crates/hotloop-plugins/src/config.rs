//! Loader configuration
//!
//! Layered with the `config` crate: serde defaults, then an optional file
//! (TOML, JSON or YAML, detected from the extension), then `HOTLOOP_*`
//! environment variables. Nested keys use `__`, e.g. `HOTLOOP_COMPILER__PROGRAM`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as Cfg, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "hotloop.toml";

/// Main configuration for the hot-reload cycle
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Plugin source directory, resolved against the working directory when relative
    pub plugins_dir: PathBuf,
    /// File extension (without the dot) that marks a plugin source
    pub source_extension: String,
    /// Parent directory for the scratch directory; system temp dir when unset
    pub scratch_root: Option<PathBuf>,
    /// External toolchain settings
    pub compiler: CompilerConfig,
    /// Sleep between discovery passes. Zero keeps the loop tight.
    pub pass_interval_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from("plugins"),
            source_extension: "rs".to_string(),
            scratch_root: None,
            compiler: CompilerConfig::default(),
            pass_interval_ms: 0,
        }
    }
}

/// Compiler invocation settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct CompilerConfig {
    /// Program name or path; bare names are resolved on `PATH`
    pub program: String,
    /// Extra arguments placed before the crate-type and output flags
    pub args: Vec<String>,
    /// Kill the compiler after this many milliseconds. Unset means wait forever.
    pub timeout_ms: Option<u64>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "rustc".to_string(),
            args: vec!["--edition".to_string(), "2021".to_string()],
            timeout_ms: None,
        }
    }
}

impl CompilerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl LoaderConfig {
    /// Create a configuration with defaults only
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the plugin source directory
    pub fn with_plugins_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.plugins_dir = dir.into();
        self
    }

    /// Set the parent directory of the scratch directory
    pub fn with_scratch_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Set the compiler settings
    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    /// Set the delay between passes
    pub fn with_pass_interval(mut self, interval: Duration) -> Self {
        self.pass_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_millis(self.pass_interval_ms)
    }

    /// Load configuration from an explicit file, or from [`DEFAULT_CONFIG_FILE`]
    /// in the working directory if it exists, then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Cfg::builder();

        match path {
            Some(path) => {
                let format = detect_format(path)?;
                builder = builder.add_source(File::from(path).format(format).required(true));
            }
            None => {
                builder = builder.add_source(
                    File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
                );
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix("HOTLOOP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("compiler.args"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a string in the given format
    pub fn from_str(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let config = Cfg::builder()
            .add_source(File::from_str(content, format))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> Result<FileFormat, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
