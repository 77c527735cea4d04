//! Explicit registry of handler types and middleware services.
//!
//! # Responsibilities
//! - Map canonical type names to handler instances and their route metadata
//! - Map canonical names to middleware services
//! - Answer metadata lookups for request-time consumers (entity input)
//!
//! # Design Decisions
//! - Built once at startup, then shared immutably behind an `Arc`
//! - Names are the only thing persisted in route caches; they are resolved
//!   back to instances here
//! - Registering a name twice replaces the earlier entry

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::metadata::{EntityAttribute, RouteAttribute, RouteMetadataSource};
use crate::handler::pipeline::{Handler, Middleware};

/// A registered handler type.
pub struct HandlerEntry {
    pub name: String,
    pub handler: Arc<dyn Handler>,
    pub routes: Vec<RouteAttribute>,
    pub entity: Option<EntityAttribute>,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

/// Handler and middleware lookup by canonical name.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, HandlerEntry>,
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler type together with its declared metadata.
    pub fn register<H: RouteMetadataSource>(&mut self, handler: H) -> &mut Self {
        self.register_handler(H::NAME, Arc::new(handler), H::routes(), H::entity())
    }

    /// Register a handler under an explicit name.
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
        routes: Vec<RouteAttribute>,
        entity: Option<EntityAttribute>,
    ) -> &mut Self {
        let name = name.into();
        tracing::debug!(handler = %name, routes = routes.len(), "Handler registered");

        let entry = HandlerEntry {
            name: name.clone(),
            handler,
            routes,
            entity,
        };
        if self.handlers.insert(name.clone(), entry).is_some() {
            tracing::warn!(handler = %name, "Handler registered twice, keeping the latest");
        }
        self
    }

    /// Register a middleware service referenced from route metadata.
    pub fn register_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: impl Middleware,
    ) -> &mut Self {
        let name = name.into();
        if self
            .middlewares
            .insert(name.clone(), Arc::new(middleware))
            .is_some()
        {
            tracing::warn!(middleware = %name, "Middleware registered twice, keeping the latest");
        }
        self
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerEntry> {
        self.handlers.get(name)
    }

    pub fn middleware(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.middlewares.get(name).cloned()
    }

    /// Entity metadata declared by a handler, if any.
    pub fn entity_of(&self, handler: &str) -> Option<&EntityAttribute> {
        self.handlers.get(handler).and_then(|e| e.entity.as_ref())
    }

    /// Registered handler names, sorted.
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut middlewares: Vec<_> = self.middlewares.keys().collect();
        middlewares.sort_unstable();
        f.debug_struct("Registry")
            .field("handlers", &self.handler_names())
            .field("middlewares", &middlewares)
            .finish()
    }
}
