//! In-process route table cache.

use std::sync::Arc;

use dashmap::DashMap;

use crate::discovery::types::ModuleRouteTable;

/// Route tables kept for the lifetime of the process.
///
/// Cloning shares the same map. Entries are immutable snapshots; a newer
/// table for a module replaces the whole entry.
#[derive(Debug, Clone)]
pub struct ProcessRouteCache {
    inner: Arc<DashMap<String, Arc<ModuleRouteTable>>>,
    enabled: bool,
}

impl Default for ProcessRouteCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProcessRouteCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, module: &str) -> Option<Arc<ModuleRouteTable>> {
        if !self.enabled {
            return None;
        }
        self.inner.get(module).map(|r| Arc::clone(r.value()))
    }

    pub fn put(&self, module: &str, table: Arc<ModuleRouteTable>) {
        if self.enabled {
            self.inner.insert(module.to_string(), table);
        }
    }

    pub fn invalidate(&self, module: &str) -> bool {
        self.inner.remove(module).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
