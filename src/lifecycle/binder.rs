//! # Lifecycle Binder
//!
//! Turns a unit's declared phase handlers into once-only listeners on the
//! [`PhaseBus`].
//!
//! ## Binding Rules
//! - Every `(unit, phase, handler)` triple is registered at most once per
//!   bootstrap cycle, however many times [`LifecycleBinder::bind`] is called.
//! - The registered-events set records `(unit, phase)` pairs. A unit with two
//!   handlers on one phase is one event and two hooks.
//! - Phase names outside the closed [`Phase`] set are warned about and skipped.
//! - A handler named `run` calls [`Unit::run`](crate::model::Unit::run) with the
//!   unit's merged options; any other name goes through
//!   [`Unit::handle`](crate::model::Unit::handle).
//! - With [`DefaultEntry::BindToReady`], a unit that declares a default entry
//!   but never binds it explicitly gets it bound to [`Phase::DEFAULT`].
//!
//! A handler failure is logged with the unit and phase, then surfaces from
//! the emit call as [`OrchestratorError::Handler`].

use crate::error::OrchestratorError;
use crate::lifecycle::bus::{Listener, ListenerFuture, PhaseBus};
use crate::model::{Application, Phase, UnitDescriptor, DEFAULT_ENTRY};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Identity of one registered hook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookKey {
    pub unit: String,
    pub phase: Phase,
    pub handler: String,
}

/// What to do with a default entry that is not bound to any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultEntry {
    BindToReady,
    Skip,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// Hooks newly registered by this call.
    pub registered: usize,
    /// Phase names that were not recognised.
    pub unknown_phases: Vec<String>,
}

pub struct LifecycleBinder {
    bus: Arc<dyn PhaseBus>,
    registered: IndexSet<HookKey>,
    events: IndexSet<(String, Phase)>,
}

impl LifecycleBinder {
    pub fn new(bus: Arc<dyn PhaseBus>) -> Self {
        Self {
            bus,
            registered: IndexSet::new(),
            events: IndexSet::new(),
        }
    }

    pub fn bind(&mut self, unit: &UnitDescriptor, default_entry: DefaultEntry) -> BindOutcome {
        let mut outcome = BindOutcome::default();

        for (phase_name, handlers) in &unit.phase_handlers {
            let phase = match phase_name.parse::<Phase>() {
                Ok(phase) => phase,
                Err(err) => {
                    warn!(unit = %unit.name, %err, "Skipping handlers bound to unknown phase");
                    outcome.unknown_phases.push(phase_name.clone());
                    continue;
                }
            };
            for handler in handlers {
                if self.register(unit, phase, handler) {
                    outcome.registered += 1;
                }
            }
        }

        if default_entry == DefaultEntry::BindToReady
            && unit.features.default_entry
            && !unit.default_entry_bound()
            && self.register(unit, Phase::DEFAULT, DEFAULT_ENTRY)
        {
            outcome.registered += 1;
        }

        outcome
    }

    fn register(&mut self, unit: &UnitDescriptor, phase: Phase, handler: &str) -> bool {
        let key = HookKey {
            unit: unit.name.clone(),
            phase,
            handler: handler.to_string(),
        };
        if self.registered.contains(&key) {
            debug!(unit = %unit.name, %phase, handler, "Hook already registered");
            return false;
        }

        self.bus.register_once(phase, listener(unit, phase, handler));
        debug!(unit = %unit.name, %phase, handler, "Hook registered");
        self.events.insert((key.unit.clone(), phase));
        self.registered.insert(key);
        true
    }

    pub fn is_registered(&self, unit: &str, phase: Phase, handler: &str) -> bool {
        self.registered.iter().any(|k| k.unit == unit && k.phase == phase && k.handler == handler)
    }

    pub fn hooks(&self) -> impl Iterator<Item = &HookKey> {
        self.registered.iter()
    }

    /// Registered `(unit, phase)` pairs, in registration order.
    pub fn registered_events(&self) -> impl Iterator<Item = (&str, Phase)> {
        self.events.iter().map(|(unit, phase)| (unit.as_str(), *phase))
    }

    /// Number of distinct `(unit, phase)` pairs with a bound handler.
    pub fn registered_count(&self) -> usize {
        self.events.len()
    }

    /// Forgets every registered hook. Pending bus listeners are not touched.
    pub fn clear(&mut self) {
        self.registered.clear();
        self.events.clear();
    }
}

fn listener(unit: &UnitDescriptor, phase: Phase, handler: &str) -> Listener {
    let name = unit.name.clone();
    let handler = handler.to_string();
    let instance = Arc::clone(&unit.instance);
    let options = unit.options.clone();

    Box::new(move |app: Arc<Application>| -> ListenerFuture {
        Box::pin(async move {
            debug!(unit = %name, %phase, handler = %handler, "Running phase handler");
            let result = if handler == DEFAULT_ENTRY {
                instance.run(&options, &app).await
            } else {
                instance.handle(phase, &handler, &app).await
            };
            result.map_err(|source| {
                error!(unit = %name, %phase, handler = %handler, error = %source, "Phase handler failed");
                OrchestratorError::Handler {
                    unit: name,
                    phase,
                    source,
                }
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticConfig;
    use crate::lifecycle::EventBus;
    use crate::mock::{descriptor, CallLog, RecordingUnit};
    use crate::model::Tier;

    fn app() -> Arc<Application> {
        Arc::new(Application::new("test", Arc::new(StaticConfig::empty())))
    }

    fn recording(name: &str, log: &CallLog) -> UnitDescriptor {
        let mut unit = descriptor(name, Tier::Core);
        unit.instance = Arc::new(RecordingUnit::with_log(name, log.clone()));
        unit
    }

    #[tokio::test]
    async fn test_hooks_fire_at_most_once() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let log = CallLog::default();
        let mut unit = recording("Router", &log);
        unit.phase_handlers.insert("load-router".into(), vec!["init".into()]);

        assert_eq!(binder.bind(&unit, DefaultEntry::BindToReady).registered, 2);
        assert_eq!(binder.bind(&unit, DefaultEntry::BindToReady).registered, 0);
        assert_eq!(binder.registered_count(), 2);

        let app = app();
        bus.emit(Phase::LoadRouter, &app).await.unwrap();
        bus.emit(Phase::Ready, &app).await.unwrap();
        bus.emit(Phase::Ready, &app).await.unwrap();
        assert_eq!(log.entries(), vec!["Router:load-router:init", "Router:run"]);
    }

    #[tokio::test]
    async fn test_explicit_run_binding_replaces_default() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let log = CallLog::default();
        let mut unit = recording("Cache", &log);
        unit.phase_handlers.insert("boot".into(), vec!["run".into()]);

        binder.bind(&unit, DefaultEntry::BindToReady);
        assert!(binder.is_registered("Cache", Phase::Boot, "run"));
        assert!(!binder.is_registered("Cache", Phase::Ready, "run"));

        bus.emit(Phase::Boot, &app()).await.unwrap();
        assert_eq!(log.entries(), vec!["Cache:run"]);
    }

    #[test]
    fn test_unknown_phase_is_skipped() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let mut unit = descriptor("Odd", Tier::Core);
        unit.features.default_entry = false;
        unit.phase_handlers.insert("on-lunch".into(), vec!["eat".into()]);
        unit.phase_handlers.insert("boot".into(), vec!["init".into()]);

        let outcome = binder.bind(&unit, DefaultEntry::BindToReady);
        assert_eq!(outcome.registered, 1);
        assert_eq!(outcome.unknown_phases, vec!["on-lunch"]);
        assert_eq!(bus.pending(Phase::Boot), 1);
    }

    #[test]
    fn test_skip_policy_leaves_default_entry_unbound() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let unit = descriptor("Plugin", Tier::User);

        assert_eq!(binder.bind(&unit, DefaultEntry::Skip).registered, 0);
        assert_eq!(bus.pending(Phase::Ready), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_carries_unit_and_phase() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let log = CallLog::default();
        let mut unit = descriptor("Broken", Tier::Core);
        unit.instance = Arc::new(RecordingUnit::with_log("Broken", log.clone()).fail_on("init"));
        unit.phase_handlers.insert("boot".into(), vec!["init".into()]);
        binder.bind(&unit, DefaultEntry::Skip);

        match bus.emit(Phase::Boot, &app()).await {
            Err(OrchestratorError::Handler { unit, phase, .. }) => {
                assert_eq!(unit, "Broken");
                assert_eq!(phase, Phase::Boot);
            }
            other => panic!("expected handler error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_two_handlers_on_one_phase_are_one_event() {
        let bus = Arc::new(EventBus::new());
        let mut binder = LifecycleBinder::new(bus.clone());
        let log = CallLog::default();
        let mut unit = recording("Cache", &log);
        unit.features.default_entry = false;
        unit.phase_handlers
            .insert("boot".into(), vec!["connect".into(), "warm".into()]);

        assert_eq!(binder.bind(&unit, DefaultEntry::BindToReady).registered, 2);
        assert_eq!(binder.hooks().count(), 2);
        assert_eq!(binder.registered_count(), 1);
        assert_eq!(
            binder.registered_events().collect::<Vec<_>>(),
            vec![("Cache", Phase::Boot)]
        );

        bus.emit(Phase::Boot, &app()).await.unwrap();
        assert_eq!(log.entries(), vec!["Cache:boot:connect", "Cache:boot:warm"]);
    }
}
