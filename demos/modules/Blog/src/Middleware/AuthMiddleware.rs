//! `Blog::Middleware::AuthMiddleware`: writes need an author header.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use modularity::handler::{Middleware, Next};

pub const AUTHOR_HEADER: &str = "x-blog-author";

pub struct AuthMiddleware;

impl Middleware for AuthMiddleware {
    fn process(&self, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        if request.method() != Method::GET && !request.headers().contains_key(AUTHOR_HEADER) {
            return async { StatusCode::UNAUTHORIZED.into_response() }.boxed();
        }
        next.run(request)
    }
}
