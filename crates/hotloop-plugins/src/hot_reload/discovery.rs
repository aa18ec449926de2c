//! Plugin discovery
//!
//! Lists plugin sources directly inside the plugin directory. Recomputed on
//! every pass; nothing is cached.

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// A plugin source file name, relative to the plugin directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginDescriptor(String);

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// List plugin sources, logging and swallowing any directory error.
///
/// An unreadable directory yields an empty pass so the cycle can recover once
/// the directory becomes readable again. Order follows the directory listing.
pub fn list_plugins(plugins_dir: &Path, extension: &str) -> Vec<PluginDescriptor> {
    match scan_plugins(plugins_dir, extension) {
        Ok(plugins) => plugins,
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    }
}

/// List plugin sources, surfacing directory errors.
///
/// Only the top level is scanned. A name matches when it ends in
/// `.{extension}`, so a file named just `.rs` is a plugin too. Directories and
/// names that are not valid UTF-8 are skipped. Symlinks are not followed, so a
/// link named `*.rs` is listed as is.
pub fn scan_plugins(
    plugins_dir: &Path,
    extension: &str,
) -> Result<Vec<PluginDescriptor>, DiscoveryError> {
    let open = |source: std::io::Error| DiscoveryError::Open {
        path: plugins_dir.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(plugins_dir).map_err(open)?;
    if !metadata.is_dir() {
        return Err(open(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }

    let suffix = format!(".{extension}");
    let mut plugins = Vec::new();

    let walker = WalkDir::new(plugins_dir).min_depth(1).max_depth(1);

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = plugins_dir.to_path_buf();
            if e.depth() == 0 {
                DiscoveryError::Open {
                    path,
                    source: e.into(),
                }
            } else {
                DiscoveryError::Read {
                    path,
                    source: e.into(),
                }
            }
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        match entry.file_name().to_str() {
            Some(name) if name.ends_with(&suffix) => plugins.push(PluginDescriptor::new(name)),
            Some(_) => {}
            None => debug!("Skipping non UTF-8 file name {:?}", entry.path()),
        }
    }

    Ok(plugins)
}
