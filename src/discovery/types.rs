//! Discovery data model.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate handler source file found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerUnit {
    pub path: PathBuf,
    /// Modification time, seconds since the Unix epoch.
    pub last_modified: u64,
}

/// Identifies the state of a module's handler directory.
///
/// `last_modified` is the newest handler mtime (0 for an empty module).
/// `handler_set` digests the relative handler paths, so removing or renaming
/// a file changes the signature even when no remaining mtime moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FreshnessSignature {
    pub last_modified: u64,
    pub handler_set: u64,
}

impl fmt::Display for FreshnessSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}", self.last_modified, self.handler_set)
    }
}

/// Route-level options attached at registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl RouteOptions {
    /// The module a route is attributed to.
    pub fn module(&self) -> Option<&str> {
        self.meta.get("module").and_then(Value::as_str)
    }
}

/// One exposed endpoint.
///
/// `pipeline` holds canonical service names; the last one is the handler that
/// declared the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub path: String,
    pub pipeline: Vec<String>,
    pub methods: Vec<String>,
    pub options: RouteOptions,
}

impl RouteDefinition {
    /// Name of the terminal handler.
    pub fn handler(&self) -> Option<&str> {
        self.pipeline.last().map(String::as_str)
    }
}

/// A module's generated routes, valid for exactly one signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRouteTable {
    pub signature: FreshnessSignature,
    pub routes: Vec<RouteDefinition>,
}

impl ModuleRouteTable {
    pub fn is_fresh(&self, signature: &FreshnessSignature) -> bool {
        self.signature == *signature
    }
}

/// Which tier produced the routes of a discovery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    Process,
    Durable,
    Generated,
}

impl RouteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteSource::Process => "process",
            RouteSource::Durable => "durable",
            RouteSource::Generated => "generated",
        }
    }
}

/// Result of a successful discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    pub module: String,
    pub source: RouteSource,
    pub routes: usize,
}
