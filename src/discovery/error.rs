//! Discovery error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a discovery call for one module.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The module has no handler directory. No routes are registered.
    #[error("Handler folder not found for module `{module}` at {}", .path.display())]
    HandlerDirectoryNotFound { module: String, path: PathBuf },

    #[error("Failed to scan handlers of module `{module}` at {}: {source}", .path.display())]
    Scan {
        module: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The route table could not be persisted. Routes were still registered
    /// for the running process.
    #[error("Failed to persist route cache for module `{module}`: {source}")]
    DurableWrite {
        module: String,
        routes: usize,
        source: CacheWriteError,
    },

    #[error("Failed to register routes of module `{module}`: {source}")]
    Registration {
        module: String,
        source: RegistrationError,
    },
}

impl DiscoveryError {
    pub fn module(&self) -> &str {
        match self {
            DiscoveryError::HandlerDirectoryNotFound { module, .. }
            | DiscoveryError::Scan { module, .. }
            | DiscoveryError::DurableWrite { module, .. }
            | DiscoveryError::Registration { module, .. } => module,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::HandlerDirectoryNotFound { .. } => "handler_directory_not_found",
            DiscoveryError::Scan { .. } => "scan",
            DiscoveryError::DurableWrite { .. } => "durable_write",
            DiscoveryError::Registration { .. } => "registration",
        }
    }

    /// Routes that were installed despite the error.
    pub fn registered_routes(&self) -> usize {
        match self {
            DiscoveryError::DurableWrite { routes, .. } => *routes,
            _ => 0,
        }
    }

    /// Whether the module must be considered unusable for this process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DiscoveryError::DurableWrite { .. })
    }
}

/// Why a durable route table could not be used.
#[derive(Debug, Error)]
pub enum CacheReadError {
    #[error("no cached route table at {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum CacheWriteError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode route table: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The host router refused a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route {method} `{path}` conflicts with registered route `{existing}`")]
pub struct RouteConflict {
    pub path: String,
    pub existing: String,
    /// Conflicting method, `ANY` for method-agnostic routes.
    pub method: String,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("route `{path}` references unknown service `{name}`")]
    UnresolvedService { path: String, name: String },

    #[error("route `{path}` has an empty pipeline")]
    EmptyPipeline { path: String },

    #[error("route `{path}` declares invalid method `{method}`")]
    InvalidMethod { path: String, method: String },

    #[error("route path `{path}` is not an absolute `{{param}}` pattern")]
    InvalidPath { path: String },

    #[error(transparent)]
    Conflict(#[from] RouteConflict),
}
