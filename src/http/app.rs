//! The live application router.
//!
//! # Responsibilities
//! - Accept route registrations from discovery (`HostRouter`)
//! - Reject conflicting routes instead of letting axum panic
//! - Dispatch requests against the latest published route table
//!
//! # Design Decisions
//! - Registrations are appended under a mutex; every change rebuilds an
//!   `axum::Router` and publishes it with `ArcSwap`
//! - A route is kept only once the rebuilt router accepted it
//! - Dispatch is lock-free: it loads the current snapshot
//! - Each dispatched request carries a `MatchedRoute` extension

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, on, MethodFilter, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceExt;

use crate::discovery::{HostRouter, RegistrationError, RouteConflict, RouteOptions, RouteRegistration};
use crate::handler::Middleware;

/// Route information attached to every dispatched request.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub path: String,
    /// Canonical name of the terminal handler.
    pub handler: String,
    pub options: RouteOptions,
}

impl MatchedRoute {
    pub fn module(&self) -> Option<&str> {
        self.options.module()
    }
}

/// Read-only view of a registered route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub path: String,
    pub methods: Vec<String>,
    pub pipeline: Vec<String>,
    pub options: RouteOptions,
}

struct AppInner {
    route_middleware: Vec<Arc<dyn Middleware>>,
    routes: Mutex<Vec<RouteRegistration>>,
    router: ArcSwap<Router>,
}

/// Host application: owns registered routes and dispatches to them.
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Application {
    /// `route_middleware` runs after routing, before each route's own pipeline.
    pub fn new(route_middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                route_middleware,
                routes: Mutex::new(Vec::new()),
                router: ArcSwap::from_pointee(empty_router()),
            }),
        }
    }

    pub fn routes(&self) -> Vec<RouteSummary> {
        self.inner
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| RouteSummary {
                path: r.path.clone(),
                methods: r.methods.iter().map(ToString::to_string).collect(),
                pipeline: r.services.clone(),
                options: r.options.clone(),
            })
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.inner
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// An axum router that dispatches every request to the registered routes.
    pub fn router(&self) -> Router {
        Router::new().fallback(dispatch).with_state(self.clone())
    }

    /// Dispatch one request against the current route table.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let router = Router::clone(&self.inner.router.load());
        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl HostRouter for Application {
    fn route(&self, route: RouteRegistration) -> Result<(), RegistrationError> {
        let mut routes = self
            .inner
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        check_conflict(&routes, &route)?;
        routes.push(route);

        let leading = &self.inner.route_middleware;
        match catch_unwind(AssertUnwindSafe(|| build_router(&routes, leading))) {
            Ok(router) => {
                self.inner.router.store(Arc::new(router));
                Ok(())
            }
            Err(panic) => {
                let path = routes.pop().map(|r| r.path).unwrap_or_default();
                let reason = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown");
                tracing::error!(path = %path, reason, "Router rejected route path");
                Err(RegistrationError::InvalidPath { path })
            }
        }
    }
}

async fn dispatch(State(app): State<Application>, request: Request<Body>) -> Response {
    app.dispatch(request).await
}

async fn no_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "no route matched" })),
    )
        .into_response()
}

fn empty_router() -> Router {
    Router::new().fallback(no_route)
}

fn build_router(routes: &[RouteRegistration], leading: &[Arc<dyn Middleware>]) -> Router {
    routes.iter().fold(empty_router(), |router, route| {
        router.route(&route.path, method_router(route, leading))
    })
}

fn method_router(route: &RouteRegistration, leading: &[Arc<dyn Middleware>]) -> MethodRouter {
    let pipeline = route.pipeline.with_leading(leading);
    let matched = MatchedRoute {
        path: route.path.clone(),
        handler: route.handler().to_string(),
        options: route.options.clone(),
    };

    let endpoint = move |mut request: Request<Body>| {
        let pipeline = pipeline.clone();
        request.extensions_mut().insert(matched.clone());
        async move { pipeline.run(request).await }
    };

    let filter = route
        .methods
        .iter()
        .filter_map(|m| MethodFilter::try_from(m.clone()).ok())
        .reduce(MethodFilter::or);

    match filter {
        Some(filter) => on(filter, endpoint),
        None => any(endpoint),
    }
}

/// Same path with an overlapping method, or the same path shape with
/// different parameter names.
fn check_conflict(existing: &[RouteRegistration], route: &RouteRegistration) -> Result<(), RouteConflict> {
    let shape = path_shape(&route.path);
    let conflict = |other: &RouteRegistration, method: String| RouteConflict {
        path: route.path.clone(),
        existing: other.path.clone(),
        method,
    };

    for other in existing {
        if other.path == route.path {
            if other.methods.is_empty() || route.methods.is_empty() {
                return Err(conflict(other, "ANY".to_string()));
            }
            if let Some(method) = route.methods.iter().find(|m| other.methods.contains(m)) {
                return Err(conflict(other, method.to_string()));
            }
        } else if path_shape(&other.path) == shape {
            return Err(conflict(other, "ANY".to_string()));
        }
    }
    Ok(())
}

fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") && segment.ends_with('}') {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
