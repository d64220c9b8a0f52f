//! Per-request context
//!
//! Carries the request id and a namespaced key/value store that resolvers
//! can use to hand state between phases of one request. A context is created
//! for each request and dropped with it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

type Namespace = HashMap<String, Value>;

#[derive(Debug)]
struct ContextInner {
    request_id: Uuid,
    store: RwLock<HashMap<String, Namespace>>,
}

/// Request-scoped context. Clones share the same store.
#[derive(Debug, Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext {
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4())
    }

    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                store: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    /// Value stored under `key`, or `default`
    pub fn get(&self, namespace: &str, key: &str, default: Value) -> Value {
        self.read(|store| store.get(namespace).and_then(|ns| ns.get(key)).cloned())
            .unwrap_or(default)
    }

    /// Store a value, returning the one it replaced
    pub fn set(&self, namespace: &str, key: &str, value: Value) -> Option<Value> {
        self.write(|store| {
            store
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value)
        })
    }

    pub fn has(&self, namespace: &str, key: &str) -> bool {
        self.read(|store| store.get(namespace).is_some_and(|ns| ns.contains_key(key)))
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Option<Value> {
        self.write(|store| store.get_mut(namespace).and_then(|ns| ns.remove(key)))
    }

    /// Drop every key of one namespace
    pub fn clear(&self, namespace: &str) {
        self.write(|store| store.remove(namespace));
    }

    /// Snapshot of one namespace
    pub fn all(&self, namespace: &str) -> HashMap<String, Value> {
        self.read(|store| store.get(namespace).cloned().unwrap_or_default())
    }

    fn read<R>(&self, f: impl FnOnce(&HashMap<String, Namespace>) -> R) -> R {
        let store = self.inner.store.read().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }

    fn write<R>(&self, f: impl FnOnce(&mut HashMap<String, Namespace>) -> R) -> R {
        let mut store = self.inner.store.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }
}
