//! Shared fixtures for integration tests: temporary module trees, handler
//! types and a recording host router.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{future::BoxFuture, FutureExt};
use tempfile::TempDir;

use modularity::config::AppConfig;
use modularity::discovery::{HostRouter, RegistrationError, RouteConflict, RouteRegistration};
use modularity::handler::{
    middleware_fn, EntityAttribute, Handler, RouteAttribute, RouteMetadataSource,
};
use modularity::http::{EntityInput, MatchedRoute};
use modularity::Registry;

/// A modules base directory plus a cache directory, removed on drop.
pub struct ModuleTree {
    dir: TempDir,
}

impl ModuleTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn base(&self) -> PathBuf {
        self.dir.path().join("modules")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn handler_dir(&self, module: &str) -> PathBuf {
        self.base().join(module).join("src/Handler")
    }

    /// Write `<module>/src/Handler/<file>` with the given mtime (unix seconds).
    pub fn write_handler(&self, module: &str, file: &str, mtime: u64) -> PathBuf {
        let path = self.handler_dir(module).join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "// handler source\n").unwrap();
        set_mtime(&path, mtime);
        path
    }

    pub fn touch(&self, module: &str, file: &str, mtime: u64) {
        set_mtime(&self.handler_dir(module).join(file), mtime);
    }

    pub fn remove_handler(&self, module: &str, file: &str) {
        fs::remove_file(self.handler_dir(module).join(file)).unwrap();
    }

    /// Create an empty handler directory.
    pub fn empty_module(&self, module: &str) {
        fs::create_dir_all(self.handler_dir(module)).unwrap();
    }

    pub fn config(&self, modules: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.modules = modules.iter().map(|m| m.to_string()).collect();
        config.discovery.modules_base_path = self.base();
        config.cache.dir = self.cache_dir();
        config
    }

    pub fn artifact(&self, module: &str) -> PathBuf {
        self.cache_dir()
            .join(format!("routes.{}.cache.json", module.to_lowercase()))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// `Blog::Handler::PostHandler`: `GET|POST /posts`, entity-aware.
#[derive(Default)]
pub struct PostHandler;

impl Handler for PostHandler {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        async move {
            let module = request
                .extensions()
                .get::<MatchedRoute>()
                .and_then(|m| m.module().map(str::to_string));
            let input = request.extensions().get::<EntityInput>().map(|input| {
                serde_json::json!({
                    "dto": input.dto,
                    "entity": input.entity,
                    "data": input.data,
                })
            });
            Json(serde_json::json!({
                "handler": "PostHandler",
                "module": module,
                "input": input,
            }))
            .into_response()
        }
        .boxed()
    }
}

impl RouteMetadataSource for PostHandler {
    const NAME: &'static str = "Blog::Handler::PostHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/posts").methods(["GET", "POST"])]
    }

    fn entity() -> Option<EntityAttribute> {
        Some(EntityAttribute::new("Blog::Dto::PostInput").entity("Blog::Entity::Post"))
    }
}

/// `Blog::Handler::TagHandler`: `/tags` for any method, behind a header middleware.
#[derive(Default)]
pub struct TagHandler;

impl Handler for TagHandler {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        let stamped = request.headers().contains_key("x-stamped");
        async move {
            Json(serde_json::json!({ "handler": "TagHandler", "stamped": stamped }))
                .into_response()
        }
        .boxed()
    }
}

impl RouteMetadataSource for TagHandler {
    const NAME: &'static str = "Blog::Handler::TagHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/tags")
            .middleware("Blog::Middleware::Stamp")
            .meta("module", "Taxonomy")]
    }
}

/// `Shop::Handler::CartHandler`: `GET /cart`.
#[derive(Default)]
pub struct CartHandler;

impl Handler for CartHandler {
    fn handle(&self, _request: Request<Body>) -> BoxFuture<'static, Response> {
        async { "cart".into_response() }.boxed()
    }
}

impl RouteMetadataSource for CartHandler {
    const NAME: &'static str = "Shop::Handler::CartHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/cart").methods(["GET"])]
    }
}

/// `Blog::Handler::BrokenHandler`: declares an unterminated path parameter.
/// Not part of `registry()`.
#[derive(Default)]
pub struct BrokenHandler;

impl Handler for BrokenHandler {
    fn handle(&self, _request: Request<Body>) -> BoxFuture<'static, Response> {
        async { "broken".into_response() }.boxed()
    }
}

impl RouteMetadataSource for BrokenHandler {
    const NAME: &'static str = "Blog::Handler::BrokenHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/posts/{id").methods(["GET"])]
    }
}

/// `Blog::Handler::SlowHandler`: `GET /slow`, answers after five seconds.
/// Not part of `registry()`.
#[derive(Default)]
pub struct SlowHandler;

impl Handler for SlowHandler {
    fn handle(&self, _request: Request<Body>) -> BoxFuture<'static, Response> {
        async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "slow".into_response()
        }
        .boxed()
    }
}

impl RouteMetadataSource for SlowHandler {
    const NAME: &'static str = "Blog::Handler::SlowHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/slow").methods(["GET"])]
    }
}

/// Registry with every fixture handler and the `Stamp` middleware.
pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .register(PostHandler)
        .register(TagHandler)
        .register(CartHandler)
        .register_middleware(
            "Blog::Middleware::Stamp",
            middleware_fn(|mut req: Request<Body>, next| {
                req.headers_mut()
                    .insert("x-stamped", axum::http::HeaderValue::from_static("1"));
                next.run(req)
            }),
        );
    Arc::new(registry)
}

/// Host router that records registrations and rejects exact duplicates.
#[derive(Default)]
pub struct RecordingRouter {
    routes: Mutex<Vec<(String, Vec<String>, String)>>,
}

impl RecordingRouter {
    /// `(path, methods, handler)` per registration, in order.
    pub fn routes(&self) -> Vec<(String, Vec<String>, String)> {
        self.routes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.routes.lock().unwrap().len()
    }
}

impl HostRouter for RecordingRouter {
    fn route(&self, route: RouteRegistration) -> Result<(), RegistrationError> {
        let methods: Vec<String> = route.methods.iter().map(ToString::to_string).collect();
        let mut routes = self.routes.lock().unwrap();
        if let Some((existing, _, _)) = routes
            .iter()
            .find(|(path, m, _)| *path == route.path && *m == methods)
        {
            return Err(RouteConflict {
                path: route.path.clone(),
                existing: existing.clone(),
                method: methods.first().cloned().unwrap_or_else(|| "ANY".to_string()),
            }
            .into());
        }
        routes.push((route.path.clone(), methods, route.handler().to_string()));
        Ok(())
    }
}

/// Host router that panics on every registration.
#[derive(Default)]
pub struct PanickingRouter {
    calls: AtomicUsize,
}

impl PanickingRouter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HostRouter for PanickingRouter {
    fn route(&self, route: RouteRegistration) -> Result<(), RegistrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("host router exploded on {}", route.path);
    }
}
