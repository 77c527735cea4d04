//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → bootstrap.rs (first request runs module discovery)
//!     → app.rs (match against registered routes)
//!     → entity.rs (payload for entity-aware handlers)
//!     → route pipeline → response
//! ```

pub mod app;
pub mod bootstrap;
pub mod entity;
pub mod server;

pub use app::{Application, MatchedRoute, RouteSummary};
pub use bootstrap::{bootstrap_middleware, Bootstrap, BootstrapFailure, ModuleState};
pub use entity::{EntityInput, EntityMiddleware};
pub use server::{HttpServer, ServerError};
