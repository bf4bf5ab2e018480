//! # Orchestration Facade
//!
//! [`Orchestrator`] drives one bootstrap cycle through a small state machine:
//!
//! ```text
//! Idle → Discovered → Validated → CoreBound → UserLoaded → Ready
//!                 ↘ Failed                                    ↓
//!                                          Stopped ← Stopping ←
//! ```
//!
//! | Step | Call | Effect |
//! |------|------|--------|
//! | Discover | [`discover`](Orchestrator::discover) | Pulls the registry, applies configuration, fills both tier maps |
//! | Validate | [`validate_and_order`](Orchestrator::validate_and_order) | Hard-gate core validation, core load order |
//! | Bind core | [`activate_core`](Orchestrator::activate_core) | Binds every core unit in load order |
//! | Load user | [`activate_user`](Orchestrator::activate_user) | Soft validation, user order, binds or runs each unit |
//! | Teardown | [`deactivate_all`](Orchestrator::deactivate_all) | Uninstall hooks, clears all state |
//!
//! [`bootstrap`](Orchestrator::bootstrap) runs the first four steps in one call.
//!
//! ## Failure Policy
//! Core problems fail fast: a validation failure or a dependency cycle moves
//! the orchestrator to `Failed` before any core handler is bound. User
//! problems degrade gracefully: a user unit with unmet dependencies is
//! skipped with a warning and the rest keep loading.
//!
//! Query methods are plain reads and work in every state.

use crate::capability::CapabilityIndex;
use crate::catalog::{CatalogAdapter, DisabledUnit, PluginConfig, UnitMetadata, UnitRegistry};
use crate::error::{OrchestratorError, Result};
use crate::lifecycle::{BindOutcome, DefaultEntry, HookKey, LifecycleBinder, PhaseBus};
use crate::model::{Application, Tier, Unit, UnitDescriptor, UnitInfo};
use crate::resolver::{resolve_core_order, resolve_user_order};
use crate::validator::DependencyValidator;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type UnitMap = IndexMap<String, UnitDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestratorState {
    Idle,
    Discovered,
    Validated,
    CoreBound,
    UserLoaded,
    Ready,
    Stopping,
    Stopped,
    /// Terminal for this cycle; only [`Orchestrator::deactivate_all`] leaves it.
    Failed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Discovered => "discovered",
            OrchestratorState::Validated => "validated",
            OrchestratorState::CoreBound => "core-bound",
            OrchestratorState::UserLoaded => "user-loaded",
            OrchestratorState::Ready => "ready",
            OrchestratorState::Stopping => "stopping",
            OrchestratorState::Stopped => "stopped",
            OrchestratorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counters reported by [`Orchestrator::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub core_count: usize,
    pub user_count: usize,
    pub total_count: usize,
    /// Distinct `(unit, phase)` pairs with at least one bound handler.
    pub registered_hook_count: usize,
}

/// A provided capability whose own validator rejected the live application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFailure {
    pub unit: String,
    pub capability: String,
    pub reason: String,
}

pub struct Orchestrator {
    app: Arc<Application>,
    registry: Arc<dyn UnitRegistry>,
    bus: Arc<dyn PhaseBus>,
    binder: LifecycleBinder,
    state: OrchestratorState,
    config: PluginConfig,
    core: UnitMap,
    user: UnitMap,
    disabled: Vec<DisabledUnit>,
    skipped: Vec<String>,
    index: CapabilityIndex,
    core_order: Vec<String>,
    user_order: Vec<String>,
    /// Units whose hooks were bound or whose entry ran, in activation order.
    activated: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        app: Arc<Application>,
        registry: Arc<dyn UnitRegistry>,
        bus: Arc<dyn PhaseBus>,
    ) -> Self {
        Self {
            binder: LifecycleBinder::new(Arc::clone(&bus)),
            app,
            registry,
            bus,
            state: OrchestratorState::Idle,
            config: PluginConfig::default(),
            core: UnitMap::new(),
            user: UnitMap::new(),
            disabled: Vec::new(),
            skipped: Vec::new(),
            index: CapabilityIndex::default(),
            core_order: Vec::new(),
            user_order: Vec::new(),
            activated: Vec::new(),
        }
    }

    fn require(&self, operation: &'static str, allowed: &[OrchestratorState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Discovers both tiers from the registry and the plugin configuration.
    ///
    /// Repeatable: each call rebuilds the tier maps from scratch.
    pub fn discover(&mut self) -> Result<Stats> {
        use OrchestratorState::*;
        self.require("discover", &[Idle, Discovered, Stopped])?;

        let config = PluginConfig::load(self.app.config_store().as_ref())?;
        let adapter = CatalogAdapter::new(Arc::clone(&self.registry), config);
        let discovery = adapter.discover_all();

        self.config = adapter.config().clone();
        self.core = discovery.core;
        self.user = discovery.user;
        self.disabled = discovery.disabled;
        self.skipped.clear();
        self.index = CapabilityIndex::default();
        self.core_order.clear();
        self.user_order.clear();
        self.state = Discovered;

        info!(
            core = self.core.len(),
            user = self.user.len(),
            disabled = self.disabled.len(),
            "Units discovered"
        );
        Ok(self.stats())
    }

    /// Validates the core tier and resolves its load order.
    pub fn validate_and_order(&mut self) -> Result<&[String]> {
        self.require("validate", &[OrchestratorState::Discovered])?;

        self.index = CapabilityIndex::build(self.core.values());
        let report = DependencyValidator::new(&self.app, &self.index).validate_core(&self.core);
        if !report.is_clean() {
            error!(units = ?report.failing_units(), "Core unit validation failed");
            self.state = OrchestratorState::Failed;
            return Err(OrchestratorError::Validation(report));
        }

        match resolve_core_order(&self.core, &self.index) {
            Ok(order) => self.core_order = order,
            Err(err) => {
                error!(%err, "Core load order could not be resolved");
                self.state = OrchestratorState::Failed;
                return Err(err);
            }
        }

        info!(order = ?self.core_order, "Core load order resolved");
        self.state = OrchestratorState::Validated;
        Ok(self.core_order.as_slice())
    }

    /// Binds every core unit, in load order.
    pub fn activate_core(&mut self) -> Result<()> {
        self.require("activate core units", &[OrchestratorState::Validated])?;

        for name in &self.core_order {
            let Some(unit) = self.core.get(name) else {
                continue;
            };
            let outcome = self.binder.bind(unit, DefaultEntry::BindToReady);
            info!(unit = %name, hooks = outcome.registered, "✓ Core unit bound");
            self.activated.push(name.clone());
        }

        self.state = OrchestratorState::CoreBound;
        Ok(())
    }

    /// Loads the user tier and returns the names of the units that loaded.
    ///
    /// Units with unmet dependencies are skipped. Units whose only behavior
    /// is their default entry run right here, one after the other; every
    /// other unit is bound and activates when its phases fire.
    pub async fn activate_user(&mut self) -> Result<Vec<String>> {
        self.require("activate user units", &[OrchestratorState::CoreBound])?;

        let visible = CapabilityIndex::build(self.core.values().chain(self.user.values()));
        self.skipped =
            DependencyValidator::new(&self.app, &visible).validate_user(&self.core, &self.user);
        for name in &self.skipped {
            self.user.shift_remove(name);
        }
        self.user_order = resolve_user_order(&self.user, &self.config.list);

        let mut loaded = Vec::with_capacity(self.user_order.len());
        for name in &self.user_order {
            let Some(unit) = self.user.get(name) else {
                continue;
            };

            if unit.is_entry_only() {
                debug!(unit = %name, "Running default entry");
                if let Err(source) = unit.instance.run(&unit.options, &self.app).await {
                    error!(unit = %name, error = %source, "User unit failed to load");
                    self.state = OrchestratorState::Failed;
                    return Err(OrchestratorError::Activation {
                        unit: name.clone(),
                        source,
                    });
                }
            } else {
                let outcome = self.binder.bind(unit, DefaultEntry::BindToReady);
                if !outcome.unknown_phases.is_empty() {
                    warn!(unit = %name, phases = ?outcome.unknown_phases, "User unit partially bound");
                }
            }

            info!(unit = %name, "✓ User unit loaded");
            self.activated.push(name.clone());
            loaded.push(name.clone());
        }

        self.state = OrchestratorState::UserLoaded;
        Ok(loaded)
    }

    /// Discover, validate, bind core, load user.
    pub async fn bootstrap(&mut self) -> Result<Vec<String>> {
        self.discover()?;
        self.validate_and_order()?;
        self.activate_core()?;
        self.activate_user().await
    }

    /// Records that the host finished its startup phases.
    pub fn mark_ready(&mut self) -> Result<()> {
        self.require("mark ready", &[OrchestratorState::UserLoaded])?;
        self.state = OrchestratorState::Ready;
        info!("Orchestrator ready");
        Ok(())
    }

    /// Binds the application's own phase handlers, as a core unit named
    /// `<app-name>`. The angle brackets keep these hooks apart from a
    /// registered unit that shares the application's name. The unit is not
    /// added to either tier.
    pub fn register_app_events(
        &mut self,
        instance: Arc<dyn Unit>,
        metadata: UnitMetadata,
    ) -> BindOutcome {
        let unit = UnitDescriptor {
            name: format!("<{}>", self.app.name()),
            tier: Tier::Core,
            enabled: true,
            priority: metadata.priority,
            version: metadata.version,
            description: metadata.description,
            dependencies: Vec::new(),
            provides: Vec::new(),
            conflicts: Vec::new(),
            phase_handlers: metadata.phase_handlers,
            features: metadata.features,
            options: metadata.options,
            instance,
        };
        let outcome = self.binder.bind(&unit, DefaultEntry::Skip);
        debug!(app = %unit.name, hooks = outcome.registered, "Application events registered");
        outcome
    }

    /// Runs the validator of every active provided capability against the
    /// live application and returns the ones that reject it.
    pub fn verify_capabilities(&self) -> Vec<CapabilityFailure> {
        let mut failures = Vec::new();
        for unit in self.core.values().chain(self.user.values()) {
            for capability in &unit.provides {
                let Some(validator) = &capability.validator else {
                    continue;
                };
                let reason = match validator.check(&self.app) {
                    Ok(true) => continue,
                    Ok(false) => "validator rejected the application state".to_string(),
                    Err(err) => err.to_string(),
                };
                warn!(unit = %unit.name, capability = %capability.name, %reason, "Capability check failed");
                failures.push(CapabilityFailure {
                    unit: unit.name.clone(),
                    capability: capability.name.clone(),
                    reason,
                });
            }
        }
        failures
    }

    /// Tears everything down. Uninstall hooks run in reverse activation
    /// order and their failures are logged, never returned. Calling this on
    /// a stopped orchestrator does nothing.
    pub async fn deactivate_all(&mut self) {
        if self.state == OrchestratorState::Stopped {
            debug!("Already stopped");
            return;
        }
        self.state = OrchestratorState::Stopping;

        for name in self.activated.iter().rev() {
            let Some(unit) = self.core.get(name).or_else(|| self.user.get(name)) else {
                continue;
            };
            if !unit.features.uninstall {
                continue;
            }
            match unit.instance.uninstall(&self.app).await {
                Ok(()) => debug!(unit = %name, "Uninstalled"),
                Err(err) => warn!(unit = %name, error = %err, "Uninstall hook failed, continuing teardown"),
            }
        }

        self.core.clear();
        self.user.clear();
        self.disabled.clear();
        self.skipped.clear();
        self.index = CapabilityIndex::default();
        self.core_order.clear();
        self.user_order.clear();
        self.activated.clear();
        self.binder.clear();
        self.bus.clear();

        self.state = OrchestratorState::Stopped;
        info!("All units deactivated");
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// Looks a unit up by name in either tier.
    pub fn get_unit(&self, name: &str) -> Option<&UnitDescriptor> {
        self.core.get(name).or_else(|| self.user.get(name))
    }

    pub fn has_unit(&self, name: &str) -> bool {
        self.get_unit(name).is_some()
    }

    /// Every unit, core tier first, each tier in declaration order.
    pub fn list_units(&self) -> Vec<&UnitDescriptor> {
        self.core.values().chain(self.user.values()).collect()
    }

    pub fn core_units(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.core.values()
    }

    pub fn user_units(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.user.values()
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.core.keys().chain(self.user.keys()).map(String::as_str).collect()
    }

    /// Every unit by descending priority; ties keep [`list_units`](Self::list_units) order.
    pub fn units_by_priority(&self) -> Vec<&UnitDescriptor> {
        let mut units = self.list_units();
        units.sort_by(|a, b| b.priority.cmp(&a.priority));
        units
    }

    pub fn units_info(&self) -> Vec<UnitInfo> {
        self.list_units().into_iter().map(UnitDescriptor::info).collect()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            core_count: self.core.len(),
            user_count: self.user.len(),
            total_count: self.core.len() + self.user.len(),
            registered_hook_count: self.binder.registered_count(),
        }
    }

    pub fn core_order(&self) -> &[String] {
        &self.core_order
    }

    pub fn user_order(&self) -> &[String] {
        &self.user_order
    }

    /// User units skipped for unmet dependencies or conflicts.
    pub fn skipped_units(&self) -> &[String] {
        &self.skipped
    }

    pub fn disabled_units(&self) -> &[DisabledUnit] {
        &self.disabled
    }

    pub fn capabilities(&self) -> &CapabilityIndex {
        &self.index
    }

    pub fn hooks(&self) -> impl Iterator<Item = &HookKey> {
        self.binder.hooks()
    }

    /// Human-readable summary for operators. Not meant to be parsed.
    pub fn describe(&self) -> String {
        let stats = self.stats();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Orchestrator [{}]: {} core, {} user, {} hooks",
            self.state, stats.core_count, stats.user_count, stats.registered_hook_count
        );

        for (title, units) in [("Core units", &self.core), ("User units", &self.user)] {
            let _ = writeln!(out, "{title}:");
            if units.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for unit in units.values() {
                let _ = write!(out, "  - {}", unit.name);
                if let Some(version) = &unit.version {
                    let _ = write!(out, " v{version}");
                }
                let _ = write!(out, " (priority {})", unit.priority);
                if let Some(description) = &unit.description {
                    let _ = write!(out, ": {description}");
                }
                let _ = writeln!(out);
            }
        }

        if !self.core_order.is_empty() {
            let _ = writeln!(out, "Core order: {}", self.core_order.join(" -> "));
        }
        if !self.user_order.is_empty() {
            let _ = writeln!(out, "User order: {}", self.user_order.join(" -> "));
        }
        if !self.index.is_empty() {
            let names: Vec<&str> = self.index.names().collect();
            let _ = writeln!(out, "Capabilities: {}", names.join(", "));
        }
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Skipped: {}", self.skipped.join(", "));
        }
        if !self.disabled.is_empty() {
            let names: Vec<&str> = self.disabled.iter().map(|d| d.name.as_str()).collect();
            let _ = writeln!(out, "Disabled: {}", names.join(", "));
        }
        out
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("core", &self.core.keys().collect::<Vec<_>>())
            .field("user", &self.user.keys().collect::<Vec<_>>())
            .field("hooks", &self.binder.registered_count())
            .finish_non_exhaustive()
    }
}
