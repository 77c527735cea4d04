//! Blog demo: one module whose handler sources are scanned for discovery and
//! compiled into the binary.
//!
//! ```text
//! cargo run --example blog_app -- demos/modularity.toml
//! curl localhost:8080/blog/posts
//! curl -XPOST -H 'x-blog-author: ada' -d '{"title":"Hello"}' localhost:8080/blog/posts
//! curl localhost:8080/blog/posts/1/comments
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use modularity::config::load_config;
use modularity::observability::{logging::init_logging, metrics::init_metrics};
use modularity::{HttpServer, Registry, Shutdown};

#[path = "modules/Blog/src/Handler/mod.rs"]
mod blog_handlers;
#[path = "modules/Blog/src/Middleware/AuthMiddleware.rs"]
mod auth_middleware;

use auth_middleware::AuthMiddleware;
use blog_handlers::{CommentHandler, PostHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/modularity.toml".to_string());
    let config = load_config(Path::new(&path))?;

    init_logging(&config.observability);
    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?);
    }

    let mut registry = Registry::new();
    registry
        .register(PostHandler::default())
        .register(CommentHandler)
        .register_middleware("Blog::Middleware::AuthMiddleware", AuthMiddleware);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();

    HttpServer::new(config, Arc::new(registry))
        .run(listener, shutdown.subscribe())
        .await?;
    Ok(())
}
