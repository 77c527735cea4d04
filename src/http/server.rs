//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wire discovery, bootstrap and the application router together
//! - Wire up middleware (tracing, timeout, request ID)
//! - Mount the admin API when enabled
//! - Bind server to listener and shut down gracefully
//!
//! # Layering
//! ```text
//! SetRequestId → Trace → PropagateRequestId → Timeout
//!     → /admin/* (bearer auth)
//!     → bootstrap_middleware → Application dispatch → route pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::AppConfig;
use crate::discovery::{DiscoveryEngine, ProcessRouteCache};
use crate::handler::{Middleware, Registry};
use crate::http::app::Application;
use crate::http::bootstrap::{bootstrap_middleware, Bootstrap, BootstrapFailure};
use crate::http::entity::EntityMiddleware;
use crate::lifecycle::shutdown::wait_for_shutdown;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Eager bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapFailure),
}

/// HTTP server for the modular application.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    application: Application,
    bootstrap: Arc<Bootstrap>,
}

impl HttpServer {
    /// Create a server whose modules are discovered with a fresh process cache.
    pub fn new(config: AppConfig, registry: Arc<Registry>) -> Self {
        let process_cache = ProcessRouteCache::new(config.cache.process_enabled);
        Self::with_process_cache(config, registry, process_cache)
    }

    /// Create a server sharing an existing process cache.
    pub fn with_process_cache(
        config: AppConfig,
        registry: Arc<Registry>,
        process_cache: ProcessRouteCache,
    ) -> Self {
        let entity: Arc<dyn Middleware> = Arc::new(EntityMiddleware::new(registry.clone()));
        let application = Application::new(vec![entity]);

        let engine = DiscoveryEngine::from_config(
            &config,
            registry,
            Arc::new(application.clone()),
            process_cache,
        );
        let bootstrap = Arc::new(Bootstrap::new(config.modules.clone(), engine));

        let router = Self::build_router(&config, &application, &bootstrap);
        Self {
            router,
            config,
            application,
            bootstrap,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &AppConfig, application: &Application, bootstrap: &Arc<Bootstrap>) -> Router {
        let modules = application
            .router()
            .layer(middleware::from_fn_with_state(bootstrap.clone(), bootstrap_middleware));

        let mut router = Router::new();
        if config.admin.enabled {
            router = router.merge(setup_admin_router(AdminState {
                application: application.clone(),
                bootstrap: bootstrap.clone(),
                api_key: config.admin.api_key.as_str().into(),
            }));
        }

        router
            .fallback_service(modules)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn bootstrap(&self) -> &Arc<Bootstrap> {
        &self.bootstrap
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server until an OS signal or `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;

        if self.config.discovery.eager {
            self.bootstrap.ensure_loaded().await?;
        }

        tracing::info!(
            address = %addr,
            modules = self.config.modules.len(),
            eager = self.config.discovery.eager,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
