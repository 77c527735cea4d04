//! Read-only admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: bootstrap state and route totals
//! - `GET /admin/modules`: discovery state per configured module
//! - `GET /admin/routes`: every registered route
//! - `GET /admin/cache`: process and durable cache summary
//!
//! Every endpoint requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::http::{Application, Bootstrap};

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub application: Application,
    pub bootstrap: Arc<Bootstrap>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/modules", get(get_modules))
        .route("/admin/routes", get(get_routes))
        .route("/admin/cache", get(get_cache))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
