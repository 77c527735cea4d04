#[path = "CommentHandler.rs"]
mod comment_handler;
#[path = "PostHandler.rs"]
mod post_handler;
#[path = "post_view.rs"]
mod post_view;

pub use comment_handler::CommentHandler;
pub use post_handler::PostHandler;
