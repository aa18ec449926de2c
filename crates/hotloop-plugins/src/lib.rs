//! Hotloop plugin runtime
//!
//! Compiles Rust plugin sources into loadable modules and runs them in a
//! repeating cycle:
//! - Plugin discovery in a watched directory
//! - Compilation through `rustc` into a scratch directory
//! - Dynamic loading and entry point verification
//! - Unconditional artifact cleanup after every attempt

pub mod config;
pub mod error;
pub mod hot_reload;

pub use config::{CompilerConfig, LoaderConfig};
pub use error::{
    CompileError, ConfigError, CycleError, DiscoveryError, EnvironmentError, InvokeError,
};
pub use hot_reload::{
    CompiledArtifact, LoaderContext, NativeInvoker, PassReport, PluginCycle, PluginDescriptor,
    RustcCompiler,
};
