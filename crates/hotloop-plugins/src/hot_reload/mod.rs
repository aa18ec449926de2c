//! Hot-reload cycle
//!
//! Provides the compile-load-invoke-cleanup loop for plugin sources:
//! - Scratch directory lifecycle
//! - Plugin discovery in the watched directory
//! - Compilation through the external toolchain
//! - Dynamic loading and entry point invocation
//! - The repeating cycle tying them together

mod compiler;
mod context;
mod cycle;
mod discovery;
pub mod entry;
mod invoker;

pub use compiler::{CompiledArtifact, PluginCompiler, RustcCompiler};
pub use context::LoaderContext;
pub use cycle::{PassReport, PluginCycle, PluginOutcome};
pub use discovery::{PluginDescriptor, list_plugins, scan_plugins};
pub use invoker::{LoadedModule, ModuleRunner, NativeInvoker, Runnable};
