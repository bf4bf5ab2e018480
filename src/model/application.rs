//! # Application Handle
//!
//! The live application reference handed to every phase handler, default entry
//! and validator predicate. It exposes the configuration store and a small
//! shared state map that units use to publish what they set up (a router, a
//! server, a tracer, ...).

use crate::catalog::ConfigStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct Application {
    name: String,
    config: Arc<dyn ConfigStore>,
    state: RwLock<HashMap<String, Value>>,
}

impl Application {
    pub fn new(name: impl Into<String>, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads a whole configuration namespace.
    pub fn config(&self, namespace: &str) -> Option<Value> {
        self.config.get(namespace)
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    /// Publishes a value under `key`, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.state.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.write().remove(key)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.state.read().keys().cloned().collect();
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("state", &keys)
            .finish()
    }
}
