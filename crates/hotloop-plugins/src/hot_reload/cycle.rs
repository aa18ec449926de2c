//! Plugin cycle
//!
//! Discover, then compile, invoke and clean up every plugin in turn, then
//! discover again. A failing plugin is logged and skipped; it never stops the
//! pass or the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error};

use super::compiler::{PluginCompiler, RustcCompiler};
use super::context::LoaderContext;
use super::discovery::{PluginDescriptor, list_plugins};
use super::invoker::{ModuleRunner, NativeInvoker};
use crate::config::LoaderConfig;
use crate::error::CycleError;

/// Result of one plugin in one pass
#[derive(Debug)]
pub struct PluginOutcome {
    pub plugin: PluginDescriptor,
    pub result: Result<(), CycleError>,
}

/// Outcomes of one discovery pass, in the order plugins ran
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<PluginOutcome>,
}

impl PassReport {
    /// Errors from this pass
    pub fn failures(&self) -> impl Iterator<Item = &CycleError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    /// Number of plugins that ran successfully
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// True when every discovered plugin ran successfully
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// The compile-load-invoke-cleanup loop over one plugin directory
pub struct PluginCycle<C = RustcCompiler, R = NativeInvoker> {
    ctx: LoaderContext,
    compiler: C,
    runner: R,
    source_extension: String,
    pass_interval: Duration,
}

impl PluginCycle {
    /// Create a cycle using `rustc` and the platform loader
    pub fn new(ctx: LoaderContext, config: &LoaderConfig) -> Self {
        let compiler = RustcCompiler::new(config.compiler.clone(), &config.source_extension);
        Self::with_parts(ctx, compiler, NativeInvoker::new(), &config.source_extension)
            .with_pass_interval(config.pass_interval())
    }
}

impl<C: PluginCompiler, R: ModuleRunner> PluginCycle<C, R> {
    /// Create a cycle from explicit compiler and runner implementations
    pub fn with_parts(
        ctx: LoaderContext,
        compiler: C,
        runner: R,
        source_extension: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            compiler,
            runner,
            source_extension: source_extension.into(),
            pass_interval: Duration::ZERO,
        }
    }

    /// Sleep between passes. Zero (the default) runs passes back to back.
    pub fn with_pass_interval(mut self, interval: Duration) -> Self {
        self.pass_interval = interval;
        self
    }

    pub fn context(&self) -> &LoaderContext {
        &self.ctx
    }

    /// Give back the context, e.g. to tear it down
    pub fn into_context(self) -> LoaderContext {
        self.ctx
    }

    /// Compile and run one plugin. Its artifacts are gone when this returns.
    pub fn compile_and_run(&self, plugin: &PluginDescriptor) -> Result<(), CycleError> {
        let artifact =
            self.compiler
                .compile(&self.ctx, plugin)
                .map_err(|source| CycleError::Compile {
                    plugin: plugin.name().to_string(),
                    source,
                })?;

        let result = self
            .runner
            .run(artifact.module_path())
            .map_err(|source| CycleError::Invoke {
                plugin: plugin.name().to_string(),
                source,
            });
        drop(artifact);
        result
    }

    /// Run a single discovery pass over every plugin
    pub fn run_pass(&self) -> PassReport {
        self.pass(None)
    }

    /// Run passes until `stop` is set. The flag is checked between plugins, so
    /// a plugin already running finishes first. Returns the number of passes
    /// started.
    pub fn run_until(&self, stop: &AtomicBool) -> u64 {
        let mut passes = 0;
        while !stop.load(Ordering::Relaxed) {
            passes += 1;
            self.pass(Some(stop));
            self.pause();
        }
        passes
    }

    fn pass(&self, stop: Option<&AtomicBool>) -> PassReport {
        let plugins = list_plugins(self.ctx.plugins_dir(), &self.source_extension);
        debug!("Discovered {} plugins", plugins.len());

        let mut report = PassReport::default();
        for plugin in plugins {
            if stop.is_some_and(|s| s.load(Ordering::Relaxed)) {
                break;
            }

            let result = self.compile_and_run(&plugin);
            if let Err(e) = &result {
                error!(plugin = %e.plugin(), stage = e.stage(), "{}", e);
            }
            report.outcomes.push(PluginOutcome { plugin, result });
        }
        report
    }

    fn pause(&self) {
        if !self.pass_interval.is_zero() {
            std::thread::sleep(self.pass_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::error::{CompileError, InvokeError};
    use crate::hot_reload::compiler::CompiledArtifact;

    /// Copies the plugin body into both the source copy and the "module".
    /// Plugins whose body is `syntax error` fail to compile.
    struct CopyCompiler {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl CopyCompiler {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl PluginCompiler for CopyCompiler {
        fn compile(
            &self,
            ctx: &LoaderContext,
            plugin: &PluginDescriptor,
        ) -> Result<CompiledArtifact, CompileError> {
            let body = std::fs::read(ctx.plugins_dir().join(plugin.name())).map_err(|source| {
                CompileError::SourceRead {
                    plugin: plugin.name().to_string(),
                    source,
                }
            })?;
            let artifact = CompiledArtifact::allocate(ctx.scratch_dir(), "rs");
            std::fs::write(artifact.source_path(), &body).unwrap();
            self.seen
                .borrow_mut()
                .extend([artifact.source_path().to_path_buf(), artifact.module_path().to_path_buf()]);

            if body == b"syntax error" {
                return Err(CompileError::Launch {
                    program: "copy".to_string(),
                    source: std::io::Error::other("syntax error"),
                });
            }
            std::fs::write(artifact.module_path(), &body).unwrap();
            Ok(artifact)
        }
    }

    /// "Runs" a module by reading it: `ok` succeeds, anything else fails with
    /// the contents as the detail.
    struct ReadRunner;

    impl ModuleRunner for ReadRunner {
        fn run(&self, module: &Path) -> Result<(), InvokeError> {
            let body = std::fs::read_to_string(module).unwrap();
            if body == "ok" {
                Ok(())
            } else {
                Err(InvokeError::Run(body))
            }
        }
    }

    fn cycle_in(dir: &Path) -> PluginCycle<CopyCompiler, ReadRunner> {
        let ctx = LoaderContext::with_plugins_dir(dir, None).unwrap();
        PluginCycle::with_parts(ctx, CopyCompiler::new(), ReadRunner, "rs")
    }

    fn scratch_is_empty<C: PluginCompiler, R: ModuleRunner>(cycle: &PluginCycle<C, R>) -> bool {
        std::fs::read_dir(cycle.context().scratch_dir())
            .unwrap()
            .next()
            .is_none()
    }

    #[test]
    fn test_successful_pass_leaves_scratch_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.rs"), b"ok").unwrap();
        let cycle = cycle_in(dir.path());

        let report = cycle.run_pass();
        assert_eq!(report.len(), 1);
        assert!(report.is_clean());
        assert!(scratch_is_empty(&cycle));
    }

    #[test]
    fn test_failure_does_not_stop_pass() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.rs"), b"ok").unwrap();
        std::fs::write(dir.path().join("broken.rs"), b"boom").unwrap();
        std::fs::write(dir.path().join("typo.rs"), b"syntax error").unwrap();
        let cycle = cycle_in(dir.path());

        let report = cycle.run_pass();
        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 1);

        let mut failures: Vec<String> = report.failures().map(|e| e.to_string()).collect();
        failures.sort();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("could not compile typo.rs"));
        assert!(failures[1].contains("broken.rs") && failures[1].contains("boom"));
        assert!(scratch_is_empty(&cycle));
    }

    #[test]
    fn test_repeated_passes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.rs"), b"ok").unwrap();
        let cycle = cycle_in(dir.path());

        for _ in 0..5 {
            let report = cycle.run_pass();
            assert_eq!(report.succeeded(), 1);
            assert!(scratch_is_empty(&cycle));
        }

        let seen = cycle.compiler.seen.borrow();
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len(), "artifact names must never repeat");
    }

    #[test]
    fn test_missing_plugin_dir_yields_empty_pass() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle_in(&dir.path().join("plugins"));

        let report = cycle.run_pass();
        assert!(report.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn test_run_until_stops_when_flag_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.rs"), b"ok").unwrap();
        let cycle = cycle_in(dir.path());

        let stop = AtomicBool::new(true);
        assert_eq!(cycle.run_until(&stop), 0);

        let stop = Arc::new(AtomicBool::new(false));
        let setter = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::Relaxed);
            })
        };
        let passes = cycle.run_until(&stop);
        setter.join().unwrap();
        assert!(passes >= 1);
        assert!(scratch_is_empty(&cycle));
    }

    #[test]
    fn test_into_context_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle_in(dir.path());
        let scratch = cycle.context().scratch_dir().to_path_buf();

        cycle.into_context().teardown();
        assert!(!scratch.exists());
    }
}
