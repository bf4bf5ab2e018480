//! # Configuration
//!
//! The orchestrator reads configuration through the [`ConfigStore`] trait and
//! only cares about one namespace: the plugin section, parsed into
//! [`PluginConfig`].
//!
//! ```json
//! {
//!   "plugin": {
//!     "list": ["AuditPlugin", "CachePlugin"],
//!     "config": {
//!       "CachePlugin": { "priority": 50, "ttl": 30 },
//!       "TracePlugin": { "enabled": false }
//!     }
//!   }
//! }
//! ```

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Read access to the application configuration store.
pub trait ConfigStore: Send + Sync {
    /// Returns a whole namespace, if present.
    fn get(&self, namespace: &str) -> Option<Value>;

    /// Returns a single key inside a namespace.
    fn get_key(&self, namespace: &str, key: &str) -> Option<Value> {
        self.get(namespace)
            .and_then(|section| section.get(key).cloned())
    }
}

/// An in-memory [`ConfigStore`] backed by a JSON object of namespaces.
#[derive(Debug, Default)]
pub struct StaticConfig {
    namespaces: RwLock<Map<String, Value>>,
}

impl StaticConfig {
    /// Builds a store from a JSON object; anything else yields an empty store.
    pub fn new(root: Value) -> Self {
        let namespaces = match root {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            namespaces: RwLock::new(namespaces),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let root: Value = serde_json::from_str(json)?;
        Ok(Self::new(root))
    }

    /// Replaces a whole namespace.
    pub fn set(&self, namespace: impl Into<String>, value: Value) {
        self.namespaces.write().insert(namespace.into(), value);
    }
}

impl ConfigStore for StaticConfig {
    fn get(&self, namespace: &str) -> Option<Value> {
        self.namespaces.read().get(namespace).cloned()
    }
}

/// Per-unit configuration override, keyed by exact unit name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UnitOverride {
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    /// Any other keys, merged into the unit's options.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The plugin configuration section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginConfig {
    /// Explicit activation list of user unit names, in load order.
    #[serde(default)]
    pub list: Vec<String>,
    /// Per-unit overrides.
    #[serde(default)]
    pub config: HashMap<String, UnitOverride>,
}

impl PluginConfig {
    pub const NAMESPACE: &'static str = "plugin";
    pub const FALLBACK_NAMESPACE: &'static str = "component";

    /// Loads the plugin section, falling back to the component section.
    /// A missing section yields the default (empty) configuration.
    pub fn load(store: &dyn ConfigStore) -> Result<Self, serde_json::Error> {
        match store
            .get(Self::NAMESPACE)
            .or_else(|| store.get(Self::FALLBACK_NAMESPACE))
        {
            Some(Value::Null) | None => Ok(Self::default()),
            Some(section) => serde_json::from_value(section),
        }
    }

    pub fn is_listed(&self, name: &str) -> bool {
        self.list.iter().any(|n| n == name)
    }

    pub fn override_for(&self, name: &str) -> Option<&UnitOverride> {
        self.config.get(name)
    }
}
