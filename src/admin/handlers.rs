use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::http::{ModuleState, RouteSummary};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SystemStatus {
    pub version: String,
    /// `pending`, `ready` or `failed`.
    pub status: String,
    pub modules: usize,
    pub routes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModuleStatus {
    pub module: String,
    #[serde(flatten)]
    pub state: ModuleState,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheSummary {
    pub process_enabled: bool,
    pub process_entries: usize,
    pub durable_enabled: bool,
    pub durable_dir: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let (status, error) = match state.bootstrap.result() {
        None => ("pending", None),
        Some(Ok(())) => ("ready", None),
        Some(Err(failure)) => ("failed", Some(failure.to_string())),
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
        modules: state.bootstrap.modules().len(),
        routes: state.application.route_count(),
        error,
    })
}

pub async fn get_modules(State(state): State<AdminState>) -> Json<Vec<ModuleStatus>> {
    Json(
        state
            .bootstrap
            .states()
            .into_iter()
            .map(|(module, state)| ModuleStatus { module, state })
            .collect(),
    )
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteSummary>> {
    Json(state.application.routes())
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheSummary> {
    let engine = state.bootstrap.engine();
    Json(CacheSummary {
        process_enabled: engine.process_cache().is_enabled(),
        process_entries: engine.process_cache().len(),
        durable_enabled: engine.store().is_enabled(),
        durable_dir: engine.store().dir().display().to_string(),
    })
}
