//! Route discovery subsystem.
//!
//! # Data Flow
//! ```text
//! module name
//!     → locator.rs (handler files + freshness signature)
//!     → process_cache.rs (hit: same signature)
//!     → store.rs (hit: same signature on disk)
//!     → extractor.rs (miss: route metadata of every handler)
//!     → store.rs write + process_cache.rs put
//!     → registrar.rs (install on the host router)
//! ```
//!
//! # Design Decisions
//! - Runs at most once per module per process (see `http::bootstrap`)
//! - Cached tables are never mutated; staleness means full replacement
//! - Types are cached by canonical name and re-resolved through the registry

pub mod engine;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod process_cache;
pub mod registrar;
pub mod store;
pub mod types;

pub use engine::DiscoveryEngine;
pub use error::{CacheReadError, CacheWriteError, DiscoveryError, RegistrationError, RouteConflict};
pub use extractor::MetadataExtractor;
pub use locator::{HandlerLocator, HandlerScan};
pub use process_cache::ProcessRouteCache;
pub use registrar::{HostRouter, RouteRegistrar, RouteRegistration};
pub use store::RouteCacheStore;
pub use types::{
    DiscoveryOutcome, FreshnessSignature, HandlerUnit, ModuleRouteTable, RouteDefinition,
    RouteOptions, RouteSource,
};
