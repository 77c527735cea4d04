//! Discovery engine tests against real module trees on disk.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use modularity::discovery::{
    DiscoveryEngine, DiscoveryError, HandlerLocator, HostRouter, ProcessRouteCache,
    RegistrationError, RouteSource,
};
use modularity::handler::Registry;
use modularity::http::{Application, Bootstrap, ModuleState};
use serde_json::Value;

mod common;

use common::{ModuleTree, PanickingRouter, RecordingRouter};

fn engine(
    tree: &ModuleTree,
    registry: Arc<Registry>,
    host: Arc<dyn HostRouter>,
    cache: ProcessRouteCache,
) -> DiscoveryEngine {
    DiscoveryEngine::from_config(&tree.config(&["Blog"]), registry, host, cache)
}

fn read_artifact(tree: &ModuleTree, module: &str) -> Value {
    serde_json::from_slice(&fs::read(tree.artifact(module)).unwrap()).unwrap()
}

#[test]
fn test_cold_discovery_generates_and_persists() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let host = Arc::new(RecordingRouter::default());
    let cache = ProcessRouteCache::default();

    let outcome = engine(&tree, common::registry(), host.clone(), cache.clone())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(outcome.routes, 1);
    assert_eq!(
        host.routes(),
        vec![(
            "/posts".to_string(),
            vec!["GET".to_string(), "POST".to_string()],
            "Blog::Handler::PostHandler".to_string()
        )]
    );

    let artifact = read_artifact(&tree, "Blog");
    assert_eq!(artifact["_lastModified"], 100);
    assert!(artifact["_handlerSet"].is_u64());
    assert_eq!(artifact["data"][0]["path"], "/posts");
    assert_eq!(artifact["data"][0]["pipeline"][0], "Blog::Handler::PostHandler");
    assert_eq!(artifact["data"][0]["methods"][1], "POST");
    assert_eq!(artifact["data"][0]["options"]["meta"]["module"], "Blog");

    let table = cache.get("Blog").expect("process cache populated");
    assert_eq!(table.signature.last_modified, 100);
}

#[test]
fn test_fresh_process_uses_durable_cache() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    let written = fs::read(tree.artifact("Blog")).unwrap();

    let host = Arc::new(RecordingRouter::default());
    let cache = ProcessRouteCache::default();
    let outcome = engine(&tree, common::registry(), host.clone(), cache.clone())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Durable);
    assert_eq!(host.count(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(fs::read(tree.artifact("Blog")).unwrap(), written, "artifact left untouched");
}

#[test]
fn test_shared_process_cache_hit() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let cache = ProcessRouteCache::default();
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();

    fs::remove_file(tree.artifact("Blog")).unwrap();

    let host = Arc::new(RecordingRouter::default());
    let outcome = engine(&tree, common::registry(), host.clone(), cache)
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Process);
    assert_eq!(host.count(), 1);
    assert!(!tree.artifact("Blog").exists(), "process hits do not touch the durable tier");
}

#[test]
fn test_newer_handler_regenerates() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let cache = ProcessRouteCache::default();
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();

    tree.touch("Blog", "PostHandler.rs", 200);

    let outcome = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(read_artifact(&tree, "Blog")["_lastModified"], 200);
    assert_eq!(cache.get("Blog").unwrap().signature.last_modified, 200);
}

#[test]
fn test_older_mtime_also_invalidates() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    tree.touch("Blog", "PostHandler.rs", 50);

    let outcome = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(read_artifact(&tree, "Blog")["_lastModified"], 50);
}

#[test]
fn test_removed_handler_invalidates_without_mtime_change() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    tree.write_handler("Blog", "TagHandler.rs", 100);
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    tree.remove_handler("Blog", "TagHandler.rs");

    let host = Arc::new(RecordingRouter::default());
    let outcome = engine(&tree, common::registry(), host.clone(), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(outcome.routes, 1);
    assert_eq!(host.routes()[0].0, "/posts");
}

#[test]
fn test_missing_handler_directory() {
    let tree = ModuleTree::new();
    let cache = ProcessRouteCache::default();

    let err = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::HandlerDirectoryNotFound { ref module, .. } if module == "Blog"));
    assert!(err.is_fatal());
    assert!(cache.is_empty());
    assert!(!tree.artifact("Blog").exists());
}

#[test]
fn test_empty_module_is_cached() {
    let tree = ModuleTree::new();
    tree.empty_module("Blog");

    let outcome = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(outcome.routes, 0);
    assert_eq!(read_artifact(&tree, "Blog")["_lastModified"], 0);
    assert_eq!(read_artifact(&tree, "Blog")["data"], Value::Array(Vec::new()));

    let outcome = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    assert_eq!(outcome.source, RouteSource::Durable);
}

#[test]
fn test_durable_write_failure_still_registers() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let mut config = tree.config(&["Blog"]);
    let blocker = tree.path().join("not-a-directory");
    fs::write(&blocker, "").unwrap();
    config.cache.dir = blocker.join("cache");

    let host = Arc::new(RecordingRouter::default());
    let cache = ProcessRouteCache::default();
    let err = DiscoveryEngine::from_config(&config, common::registry(), host.clone(), cache.clone())
        .discover("Blog")
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::DurableWrite { routes: 1, .. }));
    assert!(!err.is_fatal());
    assert_eq!(host.count(), 1);
    assert!(cache.get("Blog").is_some());
}

#[test]
fn test_corrupt_artifact_is_regenerated() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    fs::create_dir_all(tree.cache_dir()).unwrap();
    fs::write(tree.artifact("Blog"), "{ not json").unwrap();

    let outcome = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(read_artifact(&tree, "Blog")["_lastModified"], 100);
}

#[test]
fn test_unregistered_and_non_matching_files_are_ignored() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    tree.write_handler("Blog", "DraftHandler.rs", 300);
    tree.write_handler("Blog", "post_view.rs", 900);

    let host = Arc::new(RecordingRouter::default());
    let outcome = engine(&tree, common::registry(), host.clone(), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    assert_eq!(outcome.routes, 1);
    // Unregistered handlers still count toward freshness; other files do not.
    assert_eq!(read_artifact(&tree, "Blog")["_lastModified"], 300);
}

#[test]
fn test_middleware_and_module_meta_in_pipeline() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "TagHandler.rs", 100);

    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    let artifact = read_artifact(&tree, "Blog");
    assert_eq!(
        artifact["data"][0]["pipeline"],
        serde_json::json!(["Blog::Middleware::Stamp", "Blog::Handler::TagHandler"])
    );
    assert_eq!(artifact["data"][0]["methods"], serde_json::json!([]));
    assert_eq!(artifact["data"][0]["options"]["meta"]["module"], "Taxonomy");
}

#[test]
fn test_unresolvable_middleware_is_fatal() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "TagHandler.rs", 100);
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    // A later build without the middleware: the regenerated table still names it.
    let mut registry = Registry::new();
    registry.register(common::TagHandler);
    let host = Arc::new(RecordingRouter::default());
    let err = engine(&tree, Arc::new(registry), host.clone(), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap_err();

    assert!(matches!(
        err,
        DiscoveryError::Registration {
            source: RegistrationError::UnresolvedService { .. },
            ..
        }
    ));
    assert!(err.is_fatal());
    assert_eq!(host.count(), 0);
}

fn without_tag_handler() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.register(common::PostHandler);
    Arc::new(registry)
}

#[test]
fn test_cached_table_naming_unregistered_handler_is_regenerated() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    tree.write_handler("Blog", "TagHandler.rs", 100);
    let cache = ProcessRouteCache::default();
    engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();
    assert_eq!(read_artifact(&tree, "Blog")["data"].as_array().unwrap().len(), 2);

    // Warm process cache, same files, TagHandler no longer compiled in.
    let host = Arc::new(RecordingRouter::default());
    let outcome = engine(&tree, without_tag_handler(), host.clone(), cache.clone())
        .discover("Blog")
        .unwrap();
    assert_eq!(outcome.source, RouteSource::Generated);
    assert_eq!(outcome.routes, 1);
    assert_eq!(host.routes()[0].2, "Blog::Handler::PostHandler");
    assert_eq!(read_artifact(&tree, "Blog")["data"].as_array().unwrap().len(), 1);
    assert_eq!(cache.get("Blog").unwrap().routes.len(), 1);
}

#[test]
fn test_warm_and_cold_agree_on_unregistered_handler() {
    let warm = ModuleTree::new();
    let cold = ModuleTree::new();
    for tree in [&warm, &cold] {
        tree.write_handler("Blog", "PostHandler.rs", 100);
        tree.write_handler("Blog", "TagHandler.rs", 100);
    }
    engine(&warm, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    let warm_host = Arc::new(RecordingRouter::default());
    let from_durable = engine(&warm, without_tag_handler(), warm_host.clone(), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    let cold_host = Arc::new(RecordingRouter::default());
    let from_scratch = engine(&cold, without_tag_handler(), cold_host.clone(), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();

    assert_eq!(from_durable.routes, from_scratch.routes);
    assert_eq!(warm_host.routes(), cold_host.routes());

    // The rewritten artifact is a clean hit next time.
    let again = engine(&warm, without_tag_handler(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default())
        .discover("Blog")
        .unwrap();
    assert_eq!(again.source, RouteSource::Durable);
}

#[test]
fn test_disabled_process_cache_reads_durable_every_time() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let cache = ProcessRouteCache::new(false);

    let first = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();
    let second = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone())
        .discover("Blog")
        .unwrap();

    assert_eq!(first.source, RouteSource::Generated);
    assert_eq!(second.source, RouteSource::Durable);
    assert!(cache.is_empty());
}

#[test]
fn test_durable_round_trip_matches_generated_table() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    tree.write_handler("Blog", "TagHandler.rs", 120);
    let cache = ProcessRouteCache::default();
    let engine = engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), cache.clone());
    engine.discover("Blog").unwrap();

    let stored = engine.store().read("Blog").unwrap();
    assert_eq!(&stored, cache.get("Blog").unwrap().as_ref());
}

#[test]
fn test_signature_is_deterministic() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    tree.write_handler("Blog", "Nested/TagHandler.rs", 90);
    let locator = HandlerLocator::new(tree.base(), "src/Handler", "Handler", "rs");

    let first = locator.scan("Blog").unwrap();
    let second = locator.scan("Blog").unwrap();

    assert_eq!(first.signature, second.signature);
    assert_eq!(first.units, second.units);
    assert_eq!(first.signature.last_modified, 100);
}

#[test]
fn test_bootstrap_discovers_each_module_once() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let host = Arc::new(RecordingRouter::default());
    let bootstrap = Arc::new(Bootstrap::new(
        vec!["Blog".to_string()],
        engine(&tree, common::registry(), host.clone(), ProcessRouteCache::default()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bootstrap = bootstrap.clone();
            thread::spawn(move || bootstrap.ensure_module("Blog"))
        })
        .collect();
    let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(host.count(), 1, "routes registered exactly once");
    for state in states {
        assert_eq!(
            state,
            ModuleState::Done {
                source: RouteSource::Generated,
                routes: 1,
                warning: None
            }
        );
    }
    assert!(bootstrap.load_all().is_ok());
    assert_eq!(host.count(), 1);
}

#[test]
fn test_bootstrap_failure_is_sticky() {
    let tree = ModuleTree::new();
    let bootstrap = Bootstrap::new(
        vec!["Blog".to_string()],
        engine(&tree, common::registry(), Arc::new(RecordingRouter::default()), ProcessRouteCache::default()),
    );

    let failure = bootstrap.load_all().unwrap_err();
    assert_eq!(failure.module, "Blog");
    assert_eq!(failure.kind, "handler_directory_not_found");

    // Creating the directory afterwards does not trigger a retry.
    tree.write_handler("Blog", "PostHandler.rs", 100);
    assert!(matches!(bootstrap.ensure_module("Blog"), ModuleState::Failed { .. }));
}

#[test]
fn test_malformed_route_path_fails_module_without_retry() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "BrokenHandler.rs", 100);
    let mut registry = Registry::new();
    registry.register(common::BrokenHandler);
    let app = Application::default();
    let bootstrap = Bootstrap::new(
        vec!["Blog".to_string()],
        engine(&tree, Arc::new(registry), Arc::new(app.clone()), ProcessRouteCache::default()),
    );

    let state = bootstrap.ensure_module("Blog");
    assert!(
        matches!(state, ModuleState::Failed { ref kind, ref reason } if kind == "registration" && reason.contains("/posts/{id")),
        "{state:?}"
    );
    assert_eq!(app.route_count(), 0);

    // A fixed tree is not picked up within the process.
    tree.remove_handler("Blog", "BrokenHandler.rs");
    tree.write_handler("Blog", "PostHandler.rs", 200);
    assert_eq!(bootstrap.ensure_module("Blog"), state);
    assert_eq!(app.route_count(), 0);
}

#[test]
fn test_panicking_discovery_is_failed_not_retried() {
    let tree = ModuleTree::new();
    tree.write_handler("Blog", "PostHandler.rs", 100);
    let host = Arc::new(PanickingRouter::default());
    let bootstrap = Bootstrap::new(
        vec!["Blog".to_string()],
        engine(&tree, common::registry(), host.clone(), ProcessRouteCache::default()),
    );

    let first = panic::catch_unwind(AssertUnwindSafe(|| bootstrap.ensure_module("Blog")));
    assert!(first.is_err());
    assert_eq!(host.calls(), 1);

    let failed = ModuleState::Failed {
        kind: "panic".to_string(),
        reason: "route discovery panicked".to_string(),
    };
    assert_eq!(bootstrap.state("Blog"), failed);
    assert_eq!(bootstrap.ensure_module("Blog"), failed);
    assert_eq!(bootstrap.load_all().unwrap_err().kind, "panic");
    assert_eq!(host.calls(), 1);
}
