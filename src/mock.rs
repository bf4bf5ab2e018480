//! # Test Doubles
//!
//! Utilities for testing orchestration without real units.
//!
//! [`RecordingUnit`] writes every invocation into a shared [`CallLog`], so a
//! test can assert on exactly which handlers ran and in what order. It can be
//! scripted to fail on a given handler and to publish a key into the
//! application state when it runs.
//!
//! # Example
//! ```ignore
//! let log = CallLog::default();
//! let router = RecordingUnit::with_log("Router", log.clone()).publishes("router");
//! registry.component("Router", router, UnitMetadata::core().on(Phase::LoadRouter, "init"));
//! // ... bootstrap and emit phases ...
//! assert_eq!(log.entries(), vec!["Router:load-router:init"]);
//! ```

use crate::error::UnitError;
use crate::model::{Application, Phase, Tier, Unit, UnitDescriptor, UnitFeatures, UnitOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared, ordered record of unit invocations.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// A unit that records its invocations.
///
/// Log entries are `Name:phase:handler` for phase handlers, `Name:run` for
/// the default entry and `Name:uninstall` for teardown.
#[derive(Debug, Clone)]
pub struct RecordingUnit {
    name: String,
    log: CallLog,
    failing: HashSet<String>,
    publishes: Option<String>,
}

impl RecordingUnit {
    pub fn new(name: impl Into<String>) -> (Self, CallLog) {
        let log = CallLog::default();
        (Self::with_log(name, log.clone()), log)
    }

    pub fn with_log(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
            failing: HashSet::new(),
            publishes: None,
        }
    }

    /// Makes the named handler (`"run"` and `"uninstall"` included) fail.
    pub fn fail_on(mut self, handler: impl Into<String>) -> Self {
        self.failing.insert(handler.into());
        self
    }

    /// Publishes `key` into the application state after every successful call.
    pub fn publishes(mut self, key: impl Into<String>) -> Self {
        self.publishes = Some(key.into());
        self
    }

    fn finish(&self, handler: &str, app: &Application) -> Result<(), UnitError> {
        if self.failing.contains(handler) {
            return Err(UnitError::Failed(format!("{} failed in {}", self.name, handler)));
        }
        if let Some(key) = &self.publishes {
            app.set(key.clone(), Value::Bool(true));
        }
        Ok(())
    }
}

#[async_trait]
impl Unit for RecordingUnit {
    async fn handle(&self, phase: Phase, handler: &str, app: &Application) -> Result<(), UnitError> {
        tokio::task::yield_now().await;
        self.log.push(format!("{}:{}:{}", self.name, phase, handler));
        self.finish(handler, app)
    }

    async fn run(&self, _options: &UnitOptions, app: &Application) -> Result<(), UnitError> {
        tokio::task::yield_now().await;
        self.log.push(format!("{}:run", self.name));
        self.finish("run", app)
    }

    async fn uninstall(&self, _app: &Application) -> Result<(), UnitError> {
        self.log.push(format!("{}:uninstall", self.name));
        if self.failing.contains("uninstall") {
            return Err(UnitError::Failed(format!("{} failed to uninstall", self.name)));
        }
        Ok(())
    }
}

/// A bare enabled descriptor with a default entry, for resolver and
/// validator tests that never invoke the instance.
pub fn descriptor(name: &str, tier: Tier) -> UnitDescriptor {
    let (unit, _) = RecordingUnit::new(name);
    UnitDescriptor {
        name: name.to_string(),
        tier,
        enabled: true,
        priority: 0,
        version: None,
        description: None,
        dependencies: Vec::new(),
        provides: Vec::new(),
        conflicts: Vec::new(),
        phase_handlers: Default::default(),
        features: UnitFeatures {
            default_entry: true,
            uninstall: false,
        },
        options: UnitOptions::new(),
        instance: Arc::new(unit),
    }
}
