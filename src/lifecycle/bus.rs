//! # Phase Bus
//!
//! The collaborator handlers are bound to. [`PhaseBus`] is the seam the binder
//! talks to; [`EventBus`] is the in-process implementation.
//!
//! ## Dispatch Semantics
//! - Listeners are **once-only**: emitting a phase drains its listeners, so a
//!   second emission of the same phase fires nothing already fired.
//! - Listeners of one phase run **sequentially and awaited**, in registration
//!   order. The first failure aborts the rest of that phase.

use crate::error::OrchestratorError;
use crate::model::{Application, Phase};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

pub type ListenerFuture = Pin<Box<dyn Future<Output = Result<(), OrchestratorError>> + Send>>;

/// A one-shot phase listener.
pub type Listener = Box<dyn FnOnce(Arc<Application>) -> ListenerFuture + Send>;

pub trait PhaseBus: Send + Sync {
    /// Registers a listener that fires at most once, on the next emission of
    /// `phase`.
    fn register_once(&self, phase: Phase, listener: Listener);

    /// Drops every pending listener.
    fn clear(&self);

    /// Number of listeners waiting for `phase`.
    fn pending(&self, phase: Phase) -> usize;
}

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<Phase, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every pending listener of `phase` in order and returns how many
    /// ran to completion.
    pub async fn emit(
        &self,
        phase: Phase,
        app: &Arc<Application>,
    ) -> Result<usize, OrchestratorError> {
        let listeners = self.listeners.lock().remove(&phase).unwrap_or_default();
        debug!(%phase, listeners = listeners.len(), "Emitting phase");

        let mut fired = 0;
        for listener in listeners {
            listener(Arc::clone(app)).await?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Emits every startup phase in order, stopping at the first failure.
    pub async fn emit_startup(&self, app: &Arc<Application>) -> Result<(), OrchestratorError> {
        for phase in Phase::STARTUP {
            self.emit(phase, app).await?;
        }
        info!("Startup phases emitted");
        Ok(())
    }
}

impl PhaseBus for EventBus {
    fn register_once(&self, phase: Phase, listener: Listener) {
        self.listeners.lock().entry(phase).or_default().push(listener);
    }

    fn clear(&self) {
        self.listeners.lock().clear();
    }

    fn pending(&self, phase: Phase) -> usize {
        self.listeners.lock().get(&phase).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticConfig;
    use crate::error::UnitError;
    use crate::mock::CallLog;

    fn app() -> Arc<Application> {
        Arc::new(Application::new("test", Arc::new(StaticConfig::empty())))
    }

    fn recording(log: &CallLog, entry: &'static str) -> Listener {
        let log = log.clone();
        Box::new(move |_app| -> ListenerFuture {
            Box::pin(async move {
                tokio::task::yield_now().await;
                log.push(entry);
                Ok(())
            })
        })
    }

    fn failing(unit: &'static str) -> Listener {
        Box::new(move |_app| -> ListenerFuture {
            Box::pin(async move {
                Err(OrchestratorError::Handler {
                    unit: unit.to_string(),
                    phase: Phase::Boot,
                    source: UnitError::Failed("boom".into()),
                })
            })
        })
    }

    #[tokio::test]
    async fn test_listeners_fire_once_in_order() {
        let bus = EventBus::new();
        let log = CallLog::default();
        bus.register_once(Phase::Ready, recording(&log, "first"));
        bus.register_once(Phase::Ready, recording(&log, "second"));
        assert_eq!(bus.pending(Phase::Ready), 2);

        let app = app();
        assert_eq!(bus.emit(Phase::Ready, &app).await.unwrap(), 2);
        assert_eq!(bus.emit(Phase::Ready, &app).await.unwrap(), 0);
        assert_eq!(log.entries(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failure_aborts_rest_of_phase() {
        let bus = EventBus::new();
        let log = CallLog::default();
        bus.register_once(Phase::Boot, recording(&log, "before"));
        bus.register_once(Phase::Boot, failing("Broken"));
        bus.register_once(Phase::Boot, recording(&log, "after"));

        let err = bus.emit(Phase::Boot, &app()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Handler { ref unit, .. } if unit == "Broken"));
        assert_eq!(log.entries(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_startup_skips_stop() {
        let bus = EventBus::new();
        let log = CallLog::default();
        bus.register_once(Phase::Stop, recording(&log, "stop"));
        bus.register_once(Phase::LoadRouter, recording(&log, "router"));
        bus.register_once(Phase::Boot, recording(&log, "boot"));

        let app = app();
        bus.emit_startup(&app).await.unwrap();
        assert_eq!(log.entries(), vec!["boot", "router"]);
        assert_eq!(bus.pending(Phase::Stop), 1);

        bus.emit(Phase::Stop, &app).await.unwrap();
        assert_eq!(log.count("stop"), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_pending_listeners() {
        let bus = EventBus::new();
        let log = CallLog::default();
        bus.register_once(Phase::Ready, recording(&log, "ready"));
        bus.clear();
        bus.emit(Phase::Ready, &app()).await.unwrap();
        assert!(log.is_empty());
    }
}
