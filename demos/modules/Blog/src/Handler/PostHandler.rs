//! `Blog::Handler::PostHandler`: list and create posts.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{future::BoxFuture, FutureExt};
use serde::Deserialize;

use modularity::handler::{EntityAttribute, Handler, RouteAttribute, RouteMetadataSource};
use modularity::http::EntityInput;

use super::post_view::PostView;

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Default)]
pub struct PostHandler {
    posts: Arc<Mutex<Vec<PostView>>>,
}

impl PostHandler {
    fn create(posts: &Mutex<Vec<PostView>>, input: Option<&EntityInput>) -> Response {
        let Some(input) = input else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        let post = match input.parse::<PostInput>() {
            Ok(post) => post,
            Err(e) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        };

        let mut posts = posts.lock().unwrap_or_else(PoisonError::into_inner);
        let view = PostView::new(posts.len() as u64 + 1, post.title, post.body);
        posts.push(view.clone());
        (StatusCode::CREATED, Json(view)).into_response()
    }
}

impl Handler for PostHandler {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        let posts = self.posts.clone();
        async move {
            if request.method() == Method::POST {
                return Self::create(&posts, request.extensions().get::<EntityInput>());
            }
            let posts = posts.lock().unwrap_or_else(PoisonError::into_inner).clone();
            Json(posts).into_response()
        }
        .boxed()
    }
}

impl RouteMetadataSource for PostHandler {
    const NAME: &'static str = "Blog::Handler::PostHandler";

    fn routes() -> Vec<RouteAttribute> {
        vec![RouteAttribute::new("/blog/posts")
            .methods(["GET", "POST"])
            .middleware("Blog::Middleware::AuthMiddleware")
            .meta("permission", "blog.posts")]
    }

    fn entity() -> Option<EntityAttribute> {
        Some(EntityAttribute::new("Blog::Dto::PostInput").entity("Blog::Entity::Post"))
    }
}
