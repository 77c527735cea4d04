//! Handler model.
//!
//! # Data Flow
//! ```text
//! Handler type (impl RouteMetadataSource)
//!     → registry.rs (name → instance + route/entity metadata)
//!     → discovery extracts RouteDefinitions by name
//!     → registrar resolves names back into a pipeline.rs Pipeline
//! ```
//!
//! # Design Decisions
//! - Metadata is declared in code and registered explicitly at startup
//! - Pipelines reference services by canonical name so route tables can be cached

pub mod metadata;
pub mod pipeline;
pub mod registry;

pub use metadata::{EntityAttribute, RouteAttribute, RouteMetadataSource};
pub use pipeline::{handler_fn, middleware_fn, Handler, Middleware, Next, Pipeline};
pub use registry::{HandlerEntry, Registry};
