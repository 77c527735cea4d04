//! Request pipelines: middlewares followed by a terminal handler.
//!
//! # Responsibilities
//! - Define the `Handler` and `Middleware` capabilities
//! - Chain a route's middlewares in declaration order
//! - Always finish with the handler that declared the route
//!
//! # Design Decisions
//! - Futures are boxed and `'static` so pipelines can be shared across tasks
//! - A pipeline is immutable; extending it produces a new one

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Terminal unit of a request pipeline.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response>;
}

/// A stage that runs before the handler and decides whether to call `next`.
pub trait Middleware: Send + Sync + 'static {
    fn process(&self, request: Request<Body>, next: Next) -> BoxFuture<'static, Response>;
}

/// Handler backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnHandler(f)
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        (self.0)(request).boxed()
    }
}

/// Middleware backed by an async closure.
pub struct FnMiddleware<F>(F);

/// Wrap an async closure as a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnMiddleware(f)
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn process(&self, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        (self.0)(request, next).boxed()
    }
}

/// Ordered middlewares ending in a terminal handler.
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>, handler: Arc<dyn Handler>) -> Self {
        Self {
            middlewares: middlewares.into(),
            handler,
        }
    }

    /// A pipeline with only the terminal handler.
    pub fn handler_only(handler: Arc<dyn Handler>) -> Self {
        Self::new(Vec::new(), handler)
    }

    /// Return a pipeline that runs `stages` before this pipeline's own middlewares.
    pub fn with_leading(&self, stages: &[Arc<dyn Middleware>]) -> Self {
        if stages.is_empty() {
            return self.clone();
        }
        let middlewares: Vec<_> = stages
            .iter()
            .chain(self.middlewares.iter())
            .cloned()
            .collect();
        Self::new(middlewares, self.handler.clone())
    }

    /// Number of stages, handler included.
    pub fn stage_count(&self) -> usize {
        self.middlewares.len() + 1
    }

    /// Run the request through every stage.
    pub fn run(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        Next {
            pipeline: self.clone(),
            position: 0,
        }
        .run(request)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// The remainder of a pipeline, handed to each middleware.
pub struct Next {
    pipeline: Pipeline,
    position: usize,
}

impl Next {
    /// Invoke the next stage (the handler once middlewares are exhausted).
    pub fn run(self, request: Request<Body>) -> BoxFuture<'static, Response> {
        match self.pipeline.middlewares.get(self.position).cloned() {
            Some(middleware) => {
                let next = Next {
                    pipeline: self.pipeline,
                    position: self.position + 1,
                };
                middleware.process(request, next)
            }
            None => self.pipeline.handler.handle(request),
        }
    }
}
