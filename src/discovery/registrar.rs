//! Route registration into the live application router.
//!
//! # Responsibilities
//! - Resolve pipeline service names back into middleware/handler instances
//! - Validate paths and HTTP methods
//! - Install each route with its options on the host router
//!
//! # Design Decisions
//! - Every route of a batch is resolved before the first one is installed
//! - Unknown services and conflicts are fatal; the bootstrap latch keeps a
//!   module from being registered twice, so a conflict is a real bug

use std::sync::Arc;

use axum::http::Method;
use axum::routing::MethodFilter;

use crate::discovery::error::RegistrationError;
use crate::discovery::types::{RouteDefinition, RouteOptions};
use crate::handler::{Pipeline, Registry};

/// A fully resolved route, ready for the host router.
#[derive(Debug, Clone)]
pub struct RouteRegistration {
    pub path: String,
    /// Empty means any method.
    pub methods: Vec<Method>,
    pub pipeline: Pipeline,
    /// Canonical service names of the pipeline, handler last.
    pub services: Vec<String>,
    pub options: RouteOptions,
}

impl RouteRegistration {
    pub fn handler(&self) -> &str {
        self.services.last().map(String::as_str).unwrap_or_default()
    }
}

/// The capability the engine needs from the host application.
///
/// A rejected route must leave the host's route table unchanged.
pub trait HostRouter: Send + Sync {
    fn route(&self, route: RouteRegistration) -> Result<(), RegistrationError>;
}

/// Applies route definitions to a host router.
#[derive(Clone)]
pub struct RouteRegistrar {
    registry: Arc<Registry>,
    host: Arc<dyn HostRouter>,
}

impl RouteRegistrar {
    pub fn new(registry: Arc<Registry>, host: Arc<dyn HostRouter>) -> Self {
        Self { registry, host }
    }

    /// Register every route. Returns the number installed.
    pub fn register(&self, routes: &[RouteDefinition]) -> Result<usize, RegistrationError> {
        let resolved = routes
            .iter()
            .map(|route| self.resolve(route))
            .collect::<Result<Vec<_>, _>>()?;

        let count = resolved.len();
        for registration in resolved {
            let path = registration.path.clone();
            let handler = registration.handler().to_string();
            if let Err(e) = self.host.route(registration) {
                tracing::error!(
                    path = %path,
                    handler = %handler,
                    error = %e,
                    "Route registration rejected by host router"
                );
                return Err(e);
            }
            tracing::debug!(path = %path, handler = %handler, "Route registered");
        }
        Ok(count)
    }

    fn resolve(&self, route: &RouteDefinition) -> Result<RouteRegistration, RegistrationError> {
        if !is_valid_path(&route.path) {
            return Err(RegistrationError::InvalidPath {
                path: route.path.clone(),
            });
        }

        let Some((handler_name, middleware_names)) = route.pipeline.split_last() else {
            return Err(RegistrationError::EmptyPipeline {
                path: route.path.clone(),
            });
        };

        let unresolved = |name: &String| RegistrationError::UnresolvedService {
            path: route.path.clone(),
            name: name.clone(),
        };

        let handler = self
            .registry
            .handler(handler_name)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| unresolved(handler_name))?;

        let middlewares = middleware_names
            .iter()
            .map(|name| self.registry.middleware(name).ok_or_else(|| unresolved(name)))
            .collect::<Result<Vec<_>, _>>()?;

        let methods = route
            .methods
            .iter()
            .map(|m| parse_method(&route.path, m))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RouteRegistration {
            path: route.path.clone(),
            methods,
            pipeline: Pipeline::new(middlewares, handler),
            services: route.pipeline.clone(),
            options: route.options.clone(),
        })
    }
}

/// Absolute, and parameters use the `{name}` / `{*name}` syntax.
///
/// A parameter fills its whole segment and a catch-all may only be the last
/// segment; anything else would make axum panic when the route is added.
fn is_valid_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;

    segments.iter().enumerate().all(|(i, segment)| {
        if segment.starts_with(':') || segment.starts_with('*') {
            return false;
        }
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                let (name, catch_all) = match name.strip_prefix('*') {
                    Some(name) => (name, true),
                    None => (name, false),
                };
                (!catch_all || i == last) && is_param_name(name)
            }
            None => !segment.contains(['{', '}']),
        }
    })
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['{', '}', '*', ':'])
}

fn parse_method(path: &str, method: &str) -> Result<Method, RegistrationError> {
    let invalid = || RegistrationError::InvalidMethod {
        path: path.to_string(),
        method: method.to_string(),
    };
    let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| invalid())?;
    MethodFilter::try_from(parsed.clone()).map_err(|_| invalid())?;
    Ok(parsed)
}
