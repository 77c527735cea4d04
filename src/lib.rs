//! Module route discovery with a two-tier route cache.
//!
//! # Architecture Overview
//!
//! ```text
//!     first request
//!         │
//!         ▼
//!   ┌───────────┐   once per process   ┌──────────────────────────────────┐
//!   │ bootstrap │ ───────────────────▶ │ discovery engine (per module)    │
//!   └─────┬─────┘                      │  locator → process cache         │
//!         │                            │          → durable store         │
//!         │                            │          → extractor (registry)  │
//!         │                            │  registrar ──────────┐           │
//!         ▼                            └──────────────────────┼───────────┘
//!   ┌─────────────┐   route table snapshot                    │
//!   │ application │ ◀─────────────────────────────────────────┘
//!   │  (axum)     │ → entity middleware → route pipeline → handler
//!   └─────────────┘
//!
//!   Cross-cutting: config · observability · lifecycle · admin API
//! ```
//!
//! Handler types declare their routes in code (`RouteMetadataSource`) and are
//! registered once in a [`handler::Registry`]. Discovery decides which
//! handlers exist by scanning each module's handler directory, so the route
//! table follows the source tree and is cached until it changes.

// Core subsystems
pub mod config;
pub mod discovery;
pub mod handler;
pub mod http;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use discovery::DiscoveryEngine;
pub use handler::{Registry, RouteMetadataSource};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
