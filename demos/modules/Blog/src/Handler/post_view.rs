//! Response shape shared by the blog handlers. Not a handler: the locator
//! skips it because the file name lacks the `Handler` suffix.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: u64,
    pub title: String,
    pub body: String,
}

impl PostView {
    pub fn new(id: u64, title: String, body: String) -> Self {
        Self { id, title, body }
    }
}
