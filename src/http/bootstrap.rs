//! First-request bootstrap.
//!
//! # Responsibilities
//! - Run discovery for every configured module, once per process
//! - Hold concurrent first requests until discovery has finished
//! - Refuse traffic when a module failed to load
//!
//! # Design Decisions
//! - Process-wide latch is a `tokio::sync::OnceCell`; the result, success or
//!   failure, is kept for the lifetime of the process
//! - Each module also has its own mutex-guarded state, so direct callers of
//!   `ensure_module` get the same at-most-once guarantee
//! - Discovery does blocking filesystem work and runs on the blocking pool

use std::sync::{Arc, Mutex, TryLockError};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::discovery::{DiscoveryEngine, DiscoveryError, RouteSource};

/// Discovery state of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModuleState {
    Pending,
    Discovering,
    Done {
        source: RouteSource,
        routes: usize,
        /// Set when routes are live but the durable artifact was not written.
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Failed {
        kind: String,
        reason: String,
    },
}

/// Why the process refuses to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("module `{module}` failed to load ({kind}): {reason}")]
pub struct BootstrapFailure {
    pub module: String,
    pub kind: String,
    pub reason: String,
}

/// Once-per-process discovery of all configured modules.
pub struct Bootstrap {
    modules: Vec<String>,
    engine: DiscoveryEngine,
    states: DashMap<String, Arc<Mutex<ModuleState>>>,
    loaded: OnceCell<Result<(), BootstrapFailure>>,
}

impl Bootstrap {
    pub fn new(modules: Vec<String>, engine: DiscoveryEngine) -> Self {
        Self {
            modules,
            engine,
            states: DashMap::new(),
            loaded: OnceCell::new(),
        }
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    /// Discover `module` unless that already happened in this process.
    ///
    /// Concurrent callers for the same module block until the first one
    /// finishes and then observe its result.
    pub fn ensure_module(&self, module: &str) -> ModuleState {
        let latch = self.latch(module);
        let mut state = match latch.lock() {
            Ok(state) => state,
            Err(poisoned) => {
                let mut state = poisoned.into_inner();
                *state = settle_poisoned(state.clone());
                state
            }
        };

        if *state == ModuleState::Pending {
            *state = ModuleState::Discovering;
            *state = match self.engine.discover(module) {
                Ok(outcome) => ModuleState::Done {
                    source: outcome.source,
                    routes: outcome.routes,
                    warning: None,
                },
                Err(e @ DiscoveryError::DurableWrite { .. }) => ModuleState::Done {
                    source: RouteSource::Generated,
                    routes: e.registered_routes(),
                    warning: Some(e.to_string()),
                },
                Err(e) => ModuleState::Failed {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                },
            };
        }
        state.clone()
    }

    /// Discover every configured module, stopping at the first failure.
    pub fn load_all(&self) -> Result<(), BootstrapFailure> {
        for module in &self.modules {
            if let ModuleState::Failed { kind, reason } = self.ensure_module(module) {
                return Err(BootstrapFailure {
                    module: module.clone(),
                    kind,
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Resolve the process-wide latch, running discovery on first use.
    pub async fn ensure_loaded(self: &Arc<Self>) -> Result<(), BootstrapFailure> {
        self.loaded
            .get_or_init(|| {
                let this = Arc::clone(self);
                async move {
                    tracing::info!(modules = this.modules.len(), "Bootstrapping module routes");
                    match tokio::task::spawn_blocking(move || this.load_all()).await {
                        Ok(result) => result,
                        Err(e) => Err(BootstrapFailure {
                            module: "*".to_string(),
                            kind: "panic".to_string(),
                            reason: e.to_string(),
                        }),
                    }
                }
            })
            .await
            .clone()
    }

    /// `None` until the first bootstrap has completed.
    pub fn result(&self) -> Option<&Result<(), BootstrapFailure>> {
        self.loaded.get()
    }

    /// Current state of a module without waiting on an in-flight discovery.
    pub fn state(&self, module: &str) -> ModuleState {
        let Some(latch) = self.states.get(module).map(|entry| Arc::clone(entry.value())) else {
            return ModuleState::Pending;
        };
        let state = match latch.try_lock() {
            Ok(state) => state.clone(),
            Err(TryLockError::Poisoned(poisoned)) => settle_poisoned(poisoned.into_inner().clone()),
            Err(TryLockError::WouldBlock) => ModuleState::Discovering,
        };
        state
    }

    /// States of all configured modules, in configuration order.
    pub fn states(&self) -> Vec<(String, ModuleState)> {
        self.modules
            .iter()
            .map(|module| (module.clone(), self.state(module)))
            .collect()
    }

    fn latch(&self, module: &str) -> Arc<Mutex<ModuleState>> {
        self.states
            .entry(module.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ModuleState::Pending)))
            .value()
            .clone()
    }
}

/// A module whose discovery panicked is failed for good, never retried.
fn settle_poisoned(state: ModuleState) -> ModuleState {
    match state {
        ModuleState::Pending | ModuleState::Discovering => ModuleState::Failed {
            kind: "panic".to_string(),
            reason: "route discovery panicked".to_string(),
        },
        settled => settled,
    }
}

/// Axum middleware that completes bootstrap before any request is routed.
pub async fn bootstrap_middleware(
    State(bootstrap): State<Arc<Bootstrap>>,
    request: Request<Body>,
    next: axum::middleware::Next,
) -> Response {
    match bootstrap.ensure_loaded().await {
        Ok(()) => next.run(request).await,
        Err(failure) => {
            tracing::error!(
                module = %failure.module,
                kind = %failure.kind,
                path = %request.uri().path(),
                "Refusing request: route bootstrap failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "route discovery failed",
                    "module": failure.module,
                    "reason": failure.reason,
                })),
            )
                .into_response()
        }
    }
}
