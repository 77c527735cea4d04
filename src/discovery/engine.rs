//! Discovery orchestration.
//!
//! # Algorithm
//! ```text
//! discover(module):
//!     scan handler directory → signature
//!     process cache entry with equal signature → register, done
//!     durable entry with equal signature      → mirror to process cache, register, done
//!     otherwise extract every handler, write durable, mirror, register
//! ```
//!
//! # Design Decisions
//! - Validity is exact signature equality; an older mtime invalidates too
//! - Decode failures are misses and the artifact is regenerated
//! - A cached table naming a service the registry no longer has is a miss
//!   too; the same failure on freshly generated routes is fatal
//! - A failed durable write still registers the freshly generated routes

use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::discovery::error::{CacheReadError, DiscoveryError, RegistrationError};
use crate::discovery::extractor::MetadataExtractor;
use crate::discovery::locator::HandlerLocator;
use crate::discovery::process_cache::ProcessRouteCache;
use crate::discovery::registrar::{HostRouter, RouteRegistrar};
use crate::discovery::store::RouteCacheStore;
use crate::discovery::types::{DiscoveryOutcome, ModuleRouteTable, RouteDefinition, RouteSource};
use crate::handler::Registry;
use crate::observability::metrics;

/// Turns a module's handler directory into registered routes.
pub struct DiscoveryEngine {
    locator: HandlerLocator,
    extractor: MetadataExtractor,
    store: RouteCacheStore,
    process_cache: ProcessRouteCache,
    registrar: RouteRegistrar,
}

impl DiscoveryEngine {
    pub fn new(
        locator: HandlerLocator,
        extractor: MetadataExtractor,
        store: RouteCacheStore,
        process_cache: ProcessRouteCache,
        registrar: RouteRegistrar,
    ) -> Self {
        Self {
            locator,
            extractor,
            store,
            process_cache,
            registrar,
        }
    }

    /// Wire an engine from configuration.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<Registry>,
        host: Arc<dyn HostRouter>,
        process_cache: ProcessRouteCache,
    ) -> Self {
        Self::new(
            HandlerLocator::from_config(&config.discovery),
            MetadataExtractor::new(registry.clone(), &config.discovery.modules_base_path),
            RouteCacheStore::from_config(&config.cache),
            process_cache,
            RouteRegistrar::new(registry, host),
        )
    }

    pub fn store(&self) -> &RouteCacheStore {
        &self.store
    }

    pub fn process_cache(&self) -> &ProcessRouteCache {
        &self.process_cache
    }

    /// Discover and register the routes of one module.
    pub fn discover(&self, module: &str) -> Result<DiscoveryOutcome, DiscoveryError> {
        let span = tracing::info_span!("discover", module = %module);
        let _enter = span.enter();
        let started = Instant::now();

        let result = self.run(module);
        metrics::record_discovery(module, &result, started);

        match &result {
            Ok(outcome) => tracing::info!(
                source = outcome.source.as_str(),
                routes = outcome.routes,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Module routes registered"
            ),
            Err(e) if e.is_fatal() => tracing::error!(kind = e.kind(), error = %e, "Route discovery failed"),
            Err(e) => tracing::warn!(kind = e.kind(), error = %e, "Route discovery degraded"),
        }
        result
    }

    fn run(&self, module: &str) -> Result<DiscoveryOutcome, DiscoveryError> {
        let scan = self.locator.scan(module)?;
        let signature = scan.signature;

        if let Some(cached) = self.process_cache.get(module) {
            if cached.is_fresh(&signature) {
                if let Some(routes) = self.register_cached(module, &cached.routes, RouteSource::Process)? {
                    return Ok(outcome(module, RouteSource::Process, routes));
                }
            } else {
                tracing::debug!(cached = %cached.signature, current = %signature, "Process cache stale");
            }
        }

        match self.store.read(module) {
            Ok(table) if table.is_fresh(&signature) => {
                let table = Arc::new(table);
                if let Some(routes) = self.register_cached(module, &table.routes, RouteSource::Durable)? {
                    self.process_cache.put(module, table);
                    return Ok(outcome(module, RouteSource::Durable, routes));
                }
            }
            Ok(table) => {
                tracing::debug!(cached = %table.signature, current = %signature, "Durable cache stale");
            }
            Err(CacheReadError::Missing(_)) => {}
            Err(e @ CacheReadError::Decode { .. }) => {
                metrics::record_durable_decode_error(module);
                tracing::warn!(error = %e, "Durable route cache unreadable, regenerating");
            }
            Err(e) => tracing::warn!(error = %e, "Durable route cache unreadable, regenerating"),
        }

        let routes: Vec<RouteDefinition> = scan
            .units
            .iter()
            .flat_map(|unit| self.extractor.extract(unit))
            .collect();
        let table = Arc::new(ModuleRouteTable { signature, routes });

        let write_result = self.store.write(module, &table);
        self.process_cache.put(module, table.clone());
        let routes = self.register(module, &table.routes)?;

        if let Err(source) = write_result {
            return Err(DiscoveryError::DurableWrite {
                module: module.to_string(),
                routes,
                source,
            });
        }
        Ok(outcome(module, RouteSource::Generated, routes))
    }

    /// `None` when the table names a service this build no longer registers.
    /// Nothing is installed in that case, as every route resolves first.
    fn register_cached(
        &self,
        module: &str,
        routes: &[RouteDefinition],
        tier: RouteSource,
    ) -> Result<Option<usize>, DiscoveryError> {
        match self.registrar.register(routes) {
            Ok(count) => Ok(Some(count)),
            Err(RegistrationError::UnresolvedService { path, name }) => {
                tracing::warn!(
                    source = tier.as_str(),
                    path = %path,
                    service = %name,
                    "Cached routes name an unregistered service, regenerating"
                );
                Ok(None)
            }
            Err(source) => Err(DiscoveryError::Registration {
                module: module.to_string(),
                source,
            }),
        }
    }

    fn register(&self, module: &str, routes: &[RouteDefinition]) -> Result<usize, DiscoveryError> {
        self.registrar
            .register(routes)
            .map_err(|source| DiscoveryError::Registration {
                module: module.to_string(),
                source,
            })
    }
}

fn outcome(module: &str, source: RouteSource, routes: usize) -> DiscoveryOutcome {
    DiscoveryOutcome {
        module: module.to_string(),
        source,
        routes,
    }
}
