//! Route metadata extraction.
//!
//! # Responsibilities
//! - Map a handler source path to its canonical type name
//! - Look the type up in the registry
//! - Turn each declared route into a `RouteDefinition`
//!
//! # Design Decisions
//! - Unknown types are skipped: a file without a registered handler has no routes
//! - The pipeline is the declared middlewares followed by the handler itself
//! - `meta.module` defaults to the type's top-level namespace segment

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::discovery::types::{HandlerUnit, RouteDefinition, RouteOptions};
use crate::handler::Registry;

const NAMESPACE_SEPARATOR: &str = "::";

/// Builds route definitions from registered handler metadata.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    registry: Arc<Registry>,
    modules_base_path: PathBuf,
}

impl MetadataExtractor {
    pub fn new(registry: Arc<Registry>, modules_base_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            modules_base_path: modules_base_path.into(),
        }
    }

    /// Routes declared by the handler behind `unit`, possibly none.
    pub fn extract(&self, unit: &HandlerUnit) -> Vec<RouteDefinition> {
        let Some(type_name) = self.resolve_type_name(&unit.path) else {
            tracing::debug!(path = %unit.path.display(), "Handler path outside modules base, skipped");
            return Vec::new();
        };

        let Some(entry) = self.registry.handler(&type_name) else {
            tracing::debug!(handler = %type_name, "No registered handler type, skipped");
            return Vec::new();
        };

        let module = type_name
            .split(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or("UnknownModule");

        entry
            .routes
            .iter()
            .map(|route| {
                let mut pipeline = route.middlewares.clone();
                pipeline.push(type_name.clone());

                let mut meta = route.meta.clone();
                meta.entry("module")
                    .or_insert_with(|| Value::String(module.to_string()));

                RouteDefinition {
                    path: route.path.clone(),
                    pipeline,
                    methods: route.methods.clone(),
                    options: RouteOptions { meta },
                }
            })
            .collect()
    }

    /// `<base>/Blog/src/Handler/PostHandler.rs` → `Blog::Handler::PostHandler`.
    pub fn resolve_type_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.modules_base_path).ok()?;

        let mut segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let file = segments.pop()?;
        let stem = Path::new(&file).file_stem()?.to_string_lossy().into_owned();
        segments.push(stem);

        // The module's source root is not part of the namespace.
        if segments.len() > 2 && segments[1] == "src" {
            segments.remove(1);
        }

        if segments.len() < 2 {
            return None;
        }
        Some(segments.join(NAMESPACE_SEPARATOR))
    }
}
