//! Durable route cache.
//!
//! # Responsibilities
//! - Persist one route table per module under the cache directory
//! - Read it back, tagged with the signature it was generated against
//!
//! # File Format
//! ```text
//! <cache_dir>/routes.<lowercase module>.cache.json
//! { "_lastModified": 100, "_handlerSet": 1234, "data": [ {path, pipeline, methods, options}, ... ] }
//! ```
//!
//! # Design Decisions
//! - Whole-file replace: write a unique temp file in the same directory,
//!   sync it, then rename over the artifact
//! - Missing, unreadable and undecodable artifacts are all cache misses to the caller
//! - A disabled store always misses and drops writes

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::discovery::error::{CacheReadError, CacheWriteError};
use crate::discovery::types::{FreshnessSignature, ModuleRouteTable, RouteDefinition};

const ARTIFACT_PREFIX: &str = "routes.";
const ARTIFACT_SUFFIX: &str = ".cache.json";

#[derive(Debug, Serialize, Deserialize)]
struct CacheArtifact {
    #[serde(rename = "_lastModified")]
    last_modified: u64,
    #[serde(rename = "_handlerSet")]
    handler_set: u64,
    data: Vec<RouteDefinition>,
}

/// Reads and writes per-module route tables on disk.
#[derive(Debug, Clone)]
pub struct RouteCacheStore {
    dir: PathBuf,
    enabled: bool,
}

impl RouteCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            enabled: config.durable_enabled,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn artifact_path(&self, module: &str) -> PathBuf {
        self.dir
            .join(format!("{ARTIFACT_PREFIX}{}{ARTIFACT_SUFFIX}", module.to_lowercase()))
    }

    pub fn read(&self, module: &str) -> Result<ModuleRouteTable, CacheReadError> {
        let path = self.artifact_path(module);
        if !self.enabled {
            return Err(CacheReadError::Missing(path));
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheReadError::Missing(path));
            }
            Err(source) => return Err(CacheReadError::Io { path, source }),
        };

        let artifact: CacheArtifact = match serde_json::from_slice(&bytes) {
            Ok(artifact) => artifact,
            Err(source) => return Err(CacheReadError::Decode { path, source }),
        };

        Ok(ModuleRouteTable {
            signature: FreshnessSignature {
                last_modified: artifact.last_modified,
                handler_set: artifact.handler_set,
            },
            routes: artifact.data,
        })
    }

    pub fn write(&self, module: &str, table: &ModuleRouteTable) -> Result<(), CacheWriteError> {
        if !self.enabled {
            tracing::debug!(module = %module, "Durable route cache disabled, write dropped");
            return Ok(());
        }

        let artifact = CacheArtifact {
            last_modified: table.signature.last_modified,
            handler_set: table.signature.handler_set,
            data: table.routes.clone(),
        };
        let mut bytes = serde_json::to_vec_pretty(&artifact)?;
        bytes.push(b'\n');

        let path = self.artifact_path(module);
        fs::create_dir_all(&self.dir).map_err(|source| CacheWriteError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .dir
            .join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let result = write_synced(&temp_path, &bytes).and_then(|()| fs::rename(&temp_path, &path));
        if let Err(source) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheWriteError::Io { path, source });
        }

        tracing::info!(
            module = %module,
            path = %path.display(),
            routes = table.routes.len(),
            "Route cache written"
        );
        Ok(())
    }

    /// Remove a module's artifact. Returns whether one existed.
    pub fn clear(&self, module: &str) -> std::io::Result<bool> {
        match fs::remove_file(self.artifact_path(module)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove every route artifact in the cache directory.
    pub fn clear_all(&self) -> std::io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_SUFFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
