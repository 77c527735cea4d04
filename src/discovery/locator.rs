//! Handler source enumeration.
//!
//! # Responsibilities
//! - Walk `<modules_base_path>/<Module>/<handler_dir>` recursively
//! - Keep files named `<anything><suffix>.<ext>` (case-insensitive)
//! - Compute the module's freshness signature
//!
//! # Design Decisions
//! - A missing handler directory is fatal for the module (no partial results)
//! - Walk order is sorted by file name so signatures are deterministic
//! - An empty module gets signature `last_modified = 0`

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;

use crate::config::DiscoveryConfig;
use crate::discovery::error::DiscoveryError;
use crate::discovery::types::{FreshnessSignature, HandlerUnit};

/// Result of scanning one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerScan {
    pub units: Vec<HandlerUnit>,
    pub signature: FreshnessSignature,
}

/// Finds handler source units of a module.
#[derive(Debug, Clone)]
pub struct HandlerLocator {
    modules_base_path: PathBuf,
    handler_dir: PathBuf,
    /// Lower-cased `<suffix>.<ext>`.
    file_suffix: String,
}

impl HandlerLocator {
    pub fn new(
        modules_base_path: impl Into<PathBuf>,
        handler_dir: impl Into<PathBuf>,
        handler_suffix: &str,
        source_extension: &str,
    ) -> Self {
        let extension = source_extension.trim_start_matches('.');
        Self {
            modules_base_path: modules_base_path.into(),
            handler_dir: handler_dir.into(),
            file_suffix: format!("{handler_suffix}.{extension}").to_lowercase(),
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            &config.modules_base_path,
            &config.handler_dir,
            &config.handler_suffix,
            &config.source_extension,
        )
    }

    pub fn modules_base_path(&self) -> &Path {
        &self.modules_base_path
    }

    /// Handler directory of a module.
    pub fn handler_path(&self, module: &str) -> PathBuf {
        self.modules_base_path.join(module).join(&self.handler_dir)
    }

    /// Enumerate handler units and compute the module signature.
    pub fn scan(&self, module: &str) -> Result<HandlerScan, DiscoveryError> {
        let root = self.handler_path(module);
        if !root.is_dir() {
            return Err(DiscoveryError::HandlerDirectoryNotFound {
                module: module.to_string(),
                path: root,
            });
        }

        let mut units = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| DiscoveryError::Scan {
                module: module.to_string(),
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                source: e.into(),
            })?;

            if !entry.file_type().is_file() || !self.matches(entry.file_name().to_string_lossy().as_ref()) {
                continue;
            }

            let last_modified = entry
                .metadata()
                .map_err(std::io::Error::from)
                .and_then(|m| m.modified())
                .map_err(|source| DiscoveryError::Scan {
                    module: module.to_string(),
                    path: entry.path().to_path_buf(),
                    source,
                })?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            units.push(HandlerUnit {
                path: entry.into_path(),
                last_modified,
            });
        }

        let signature = signature_of(&root, &units);
        tracing::debug!(
            module = %module,
            handlers = units.len(),
            signature = %signature,
            "Handler directory scanned"
        );

        Ok(HandlerScan { units, signature })
    }

    /// File name check: at least one character before `<suffix>.<ext>`.
    fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        lower.len() > self.file_suffix.len() && lower.ends_with(&self.file_suffix)
    }
}

fn signature_of(root: &Path, units: &[HandlerUnit]) -> FreshnessSignature {
    let last_modified = units.iter().map(|u| u.last_modified).max().unwrap_or(0);

    let mut relative: Vec<String> = units
        .iter()
        .map(|u| {
            let rel = u.path.strip_prefix(root).unwrap_or(&u.path);
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    relative.sort_unstable();

    let mut hasher = Xxh3::new();
    for path in &relative {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
    }

    FreshnessSignature {
        last_modified,
        handler_set: hasher.digest(),
    }
}
