//! `Blog::Handler::CommentHandler`: comments of one post.

use axum::{
    body::Body,
    extract::{FromRequestParts, Path},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{future::BoxFuture, FutureExt};

use modularity::handler::{Handler, RouteAttribute, RouteMetadataSource};
use modularity::http::MatchedRoute;

#[derive(Default)]
pub struct CommentHandler;

impl Handler for CommentHandler {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        async move {
            let (mut parts, _body) = request.into_parts();
            let Ok(Path(id)) = Path::<u64>::from_request_parts(&mut parts, &()).await else {
                return StatusCode::NOT_FOUND.into_response();
            };
            let module = parts
                .extensions
                .get::<MatchedRoute>()
                .and_then(|m| m.module().map(str::to_string));

            Json(serde_json::json!({
                "post": id,
                "module": module,
                "comments": [],
            }))
            .into_response()
        }
        .boxed()
    }
}

impl RouteMetadataSource for CommentHandler {
    const NAME: &'static str = "Blog::Handler::CommentHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/blog/posts/{id}/comments").methods(["GET"])]
    }
}
