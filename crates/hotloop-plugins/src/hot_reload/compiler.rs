//! Plugin compiler
//!
//! Copies a plugin source into the scratch directory under a fresh name and
//! builds it into a loadable module with the external toolchain.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::context::LoaderContext;
use super::discovery::PluginDescriptor;
use crate::config::CompilerConfig;
use crate::error::CompileError;

/// Poll interval while waiting on a compiler with a timeout
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Turns a discovered plugin into a loadable module.
pub trait PluginCompiler {
    fn compile(
        &self,
        ctx: &LoaderContext,
        plugin: &PluginDescriptor,
    ) -> Result<CompiledArtifact, CompileError>;
}

/// A generated source copy and the module built from it.
///
/// Both files are removed when the artifact is dropped, whether or not the
/// module was ever built or loaded.
#[derive(Debug)]
pub struct CompiledArtifact {
    source: PathBuf,
    module: PathBuf,
}

impl CompiledArtifact {
    /// Reserve a fresh, collision-resistant pair of paths in `scratch_dir`.
    ///
    /// The source copy keeps `source_extension`; the module path swaps it for
    /// the platform's loadable-module extension.
    pub fn allocate(scratch_dir: &Path, source_extension: &str) -> Self {
        let stem = format!("plugin_{}", uuid::Uuid::new_v4().simple());
        let source = scratch_dir.join(format!("{stem}.{source_extension}"));
        let module = source.with_extension(std::env::consts::DLL_EXTENSION);
        Self { source, module }
    }

    /// Path of the source copy
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Path of the loadable module
    pub fn module_path(&self) -> &Path {
        &self.module
    }
}

impl Drop for CompiledArtifact {
    fn drop(&mut self) {
        for path in [&self.module, &self.source] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed artifact {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove artifact {:?}: {}", path, e),
            }
        }
    }
}

/// Compiler backed by `rustc --crate-type cdylib`
#[derive(Debug, Clone)]
pub struct RustcCompiler {
    config: CompilerConfig,
    source_extension: String,
    /// Program resolved on `PATH` at construction, if it was found then
    resolved: Option<PathBuf>,
}

impl RustcCompiler {
    /// Create a compiler for sources with the given extension
    pub fn new(config: CompilerConfig, source_extension: impl Into<String>) -> Self {
        let resolved = which::which(&config.program).ok();
        if resolved.is_none() {
            warn!("Compiler {} not found on PATH", config.program);
        }
        Self {
            config,
            source_extension: source_extension.into(),
            resolved,
        }
    }

    fn program(&self) -> Result<PathBuf, CompileError> {
        if let Some(path) = &self.resolved {
            return Ok(path.clone());
        }
        which::which(&self.config.program).map_err(|source| CompileError::ToolchainNotFound {
            program: self.config.program.clone(),
            source,
        })
    }

    fn command(&self, program: &Path, artifact: &CompiledArtifact) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.config.args)
            .arg("--crate-type")
            .arg("cdylib")
            .arg("-o")
            .arg(artifact.module_path())
            .arg(artifact.source_path())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn wait(
        &self,
        mut child: Child,
        plugin: &PluginDescriptor,
    ) -> Result<ExitStatus, CompileError> {
        let launch = |source: std::io::Error| CompileError::Launch {
            program: self.config.program.clone(),
            source,
        };

        let Some(timeout) = self.config.timeout() else {
            return child.wait().map_err(launch);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(launch)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill compiler for {}: {}", plugin, e);
                }
                if let Err(e) = child.wait() {
                    warn!("Failed to reap compiler for {}: {}", plugin, e);
                }
                return Err(CompileError::TimedOut {
                    plugin: plugin.name().to_string(),
                    timeout,
                });
            }
            std::thread::sleep(WAIT_POLL);
        }
    }
}

impl PluginCompiler for RustcCompiler {
    fn compile(
        &self,
        ctx: &LoaderContext,
        plugin: &PluginDescriptor,
    ) -> Result<CompiledArtifact, CompileError> {
        let contents = std::fs::read(ctx.plugins_dir().join(plugin.name())).map_err(|source| {
            CompileError::SourceRead {
                plugin: plugin.name().to_string(),
                source,
            }
        })?;

        let artifact = CompiledArtifact::allocate(ctx.scratch_dir(), &self.source_extension);
        std::fs::write(artifact.source_path(), contents).map_err(|source| {
            CompileError::SourceWrite {
                path: artifact.source_path().to_path_buf(),
                source,
            }
        })?;

        let program = self.program()?;
        debug!("Compiling {} as {:?}", plugin, artifact.source_path());

        let child = self
            .command(&program, &artifact)
            .spawn()
            .map_err(|source| CompileError::Launch {
                program: self.config.program.clone(),
                source,
            })?;

        let status = self.wait(child, plugin)?;
        if !status.success() {
            return Err(CompileError::Failed {
                plugin: plugin.name().to_string(),
                status,
            });
        }

        debug!("Compiled {} to {:?}", plugin, artifact.module_path());
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = CompiledArtifact::allocate(dir.path(), "rs");
        let b = CompiledArtifact::allocate(dir.path(), "rs");

        assert_ne!(a.source_path(), b.source_path());
        assert_ne!(a.module_path(), b.module_path());
        assert_eq!(a.source_path().parent(), Some(dir.path()));
        assert_eq!(
            a.module_path().extension().and_then(|e| e.to_str()),
            Some(std::env::consts::DLL_EXTENSION)
        );
        assert_eq!(a.source_path().file_stem(), a.module_path().file_stem());
    }

    #[test]
    fn test_drop_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = CompiledArtifact::allocate(dir.path(), "rs");
        std::fs::write(artifact.source_path(), b"src").unwrap();
        std::fs::write(artifact.module_path(), b"obj").unwrap();

        drop(artifact);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_tolerates_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = CompiledArtifact::allocate(dir.path(), "rs");
        std::fs::write(artifact.source_path(), b"src").unwrap();

        drop(artifact);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_source_is_source_read_error() {
        let plugins = tempfile::tempdir().unwrap();
        let ctx = LoaderContext::with_plugins_dir(plugins.path(), None).unwrap();
        let compiler = RustcCompiler::new(CompilerConfig::default(), "rs");

        let err = compiler
            .compile(&ctx, &PluginDescriptor::new("missing.rs"))
            .unwrap_err();
        assert!(matches!(err, CompileError::SourceRead { ref plugin, .. } if plugin == "missing.rs"));
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_toolchain_cleans_source_copy() {
        let plugins = tempfile::tempdir().unwrap();
        std::fs::write(plugins.path().join("a.rs"), b"fn main() {}").unwrap();
        let ctx = LoaderContext::with_plugins_dir(plugins.path(), None).unwrap();
        let config = CompilerConfig {
            program: "hotloop-no-such-compiler".to_string(),
            ..CompilerConfig::default()
        };
        let compiler = RustcCompiler::new(config, "rs");

        let err = compiler
            .compile(&ctx, &PluginDescriptor::new("a.rs"))
            .unwrap_err();
        assert!(matches!(err, CompileError::ToolchainNotFound { .. }));
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let plugins = tempfile::tempdir().unwrap();
        std::fs::write(plugins.path().join("a.rs"), b"").unwrap();
        let ctx = LoaderContext::with_plugins_dir(plugins.path(), None).unwrap();
        let config = CompilerConfig {
            program: "false".to_string(),
            args: Vec::new(),
            timeout_ms: None,
        };
        let compiler = RustcCompiler::new(config, "rs");

        let err = compiler
            .compile(&ctx, &PluginDescriptor::new("a.rs"))
            .unwrap_err();
        assert!(matches!(err, CompileError::Failed { ref plugin, .. } if plugin == "a.rs"));
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_compiler() {
        let plugins = tempfile::tempdir().unwrap();
        std::fs::write(plugins.path().join("slow.rs"), b"").unwrap();
        let ctx = LoaderContext::with_plugins_dir(plugins.path(), None).unwrap();
        // `sleep 30 --crate-type cdylib ...` would error on the extra args, so
        // route through sh and ignore them.
        let config = CompilerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            timeout_ms: Some(200),
        };
        let compiler = RustcCompiler::new(config, "rs");

        let started = Instant::now();
        let err = compiler
            .compile(&ctx, &PluginDescriptor::new("slow.rs"))
            .unwrap_err();
        assert!(matches!(err, CompileError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);
    }
}
