//! Module invoker
//!
//! Opens a compiled module, checks its entry point against the protocol in
//! [`super::entry`] and calls it once on the current thread.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use super::entry::{
    DETAIL_CAPACITY, ENTRY_SIGNATURE, ENTRY_SYMBOL, ENTRY_SYMBOL_C, EntryFn, SIGNATURE_SYMBOL_C,
    SignatureFn, decode_outcome,
};
use crate::error::InvokeError;

/// Something that runs with no input and reports success or a failure reason.
pub trait Runnable {
    fn run(&self) -> Result<(), String>;
}

/// Loads and runs the module at a path.
pub trait ModuleRunner {
    fn run(&self, module: &Path) -> Result<(), InvokeError>;
}

/// A loaded module whose entry point passed the signature check
pub struct LoadedModule {
    path: PathBuf,
    entry: EntryFn,
    /// Keeps `entry` valid; must outlive every call through it
    library: Library,
}

impl LoadedModule {
    /// Open a module and resolve its entry point.
    ///
    /// # Safety
    /// Loading a library runs its initializers with full access to the
    /// process. The module's `Run_signature` is trusted to describe `Run`.
    pub unsafe fn open(path: &Path) -> Result<Self, InvokeError> {
        let library = unsafe { Library::new(path) }.map_err(|source| InvokeError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = unsafe {
            let symbol: Symbol<EntryFn> =
                library
                    .get(ENTRY_SYMBOL_C)
                    .map_err(|source| InvokeError::SymbolNotFound {
                        symbol: ENTRY_SYMBOL,
                        source,
                    })?;
            *symbol
        };

        let declared = unsafe { declared_signature(&library) };
        if declared.as_deref() != Some(ENTRY_SIGNATURE) {
            return Err(InvokeError::SignatureMismatch {
                symbol: ENTRY_SYMBOL,
                expected: ENTRY_SIGNATURE,
                actual: declared.unwrap_or_else(|| "<undeclared>".to_string()),
            });
        }

        debug!("Resolved {} in {:?}", ENTRY_SYMBOL, path);
        Ok(Self {
            path: path.to_path_buf(),
            entry,
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unload the module
    pub fn close(self) {
        let Self { path, library, .. } = self;
        if let Err(e) = library.close() {
            warn!("Failed to unload {:?}: {}", path, e);
        }
    }
}

impl Runnable for LoadedModule {
    fn run(&self) -> Result<(), String> {
        let mut detail = vec![0u8; DETAIL_CAPACITY];
        let code = unsafe { (self.entry)(detail.as_mut_ptr(), detail.len()) };
        decode_outcome(code, &detail)
    }
}

/// Read the declaration a module gives for its entry point.
unsafe fn declared_signature(library: &Library) -> Option<String> {
    let symbol: Symbol<SignatureFn> = unsafe { library.get(SIGNATURE_SYMBOL_C) }.ok()?;
    let ptr = unsafe { symbol() };
    if ptr.is_null() {
        return Some("<null>".to_string());
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Invoker backed by the platform dynamic loader
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeInvoker;

impl NativeInvoker {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleRunner for NativeInvoker {
    fn run(&self, module: &Path) -> Result<(), InvokeError> {
        let loaded = unsafe { LoadedModule::open(module)? };
        let outcome = loaded.run();
        loaded.close();
        outcome.map_err(InvokeError::Run)
    }
}
