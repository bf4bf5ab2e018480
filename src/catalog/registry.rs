//! # Unit Registry
//!
//! The external registry the orchestrator pulls discovered units from. How the
//! registry is populated (explicit registration calls, code generation, ...)
//! does not matter to the orchestrator; it only calls
//! [`UnitRegistry::list_units`].

use crate::model::{
    Capability, Dependency, Phase, PhaseHandlers, Tier, Unit, UnitFeatures, UnitOptions,
    DEFAULT_ENTRY,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The kind of marker a registry entry was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Component,
    Plugin,
    Controller,
    Middleware,
    Service,
}

impl MarkerKind {
    /// Markers that denote orchestratable extension units.
    pub const EXTENSIONS: [MarkerKind; 2] = [MarkerKind::Component, MarkerKind::Plugin];

    /// The id prefix registries may put in front of the unit name.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            MarkerKind::Component => "COMPONENT:",
            MarkerKind::Plugin => "PLUGIN:",
            MarkerKind::Controller => "CONTROLLER:",
            MarkerKind::Middleware => "MIDDLEWARE:",
            MarkerKind::Service => "SERVICE:",
        }
    }

    pub fn is_extension(&self) -> bool {
        Self::EXTENSIONS.contains(self)
    }
}

/// Declared unit defaults, as recorded by the registry.
#[derive(Debug, Clone, Default)]
pub struct UnitMetadata {
    pub tier: Tier,
    pub enabled: Option<bool>,
    pub priority: i32,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Flat list of required unit names.
    pub requires: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub provides: Vec<Capability>,
    pub conflicts: Vec<String>,
    pub phase_handlers: PhaseHandlers,
    pub features: UnitFeatures,
    pub options: UnitOptions,
}

impl UnitMetadata {
    pub fn core() -> Self {
        Self {
            tier: Tier::Core,
            ..Self::default()
        }
    }

    pub fn user() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn provides(mut self, capability: Capability) -> Self {
        self.provides.push(capability);
        self
    }

    pub fn conflicts_with(mut self, name: impl Into<String>) -> Self {
        self.conflicts.push(name.into());
        self
    }

    /// Binds `handler` to `phase`.
    pub fn on(self, phase: Phase, handler: impl Into<String>) -> Self {
        self.on_named(phase.as_str(), handler)
    }

    /// Binds `handler` to a phase given by name. Unknown names are kept as
    /// declared and rejected with a warning at bind time.
    pub fn on_named(mut self, phase: impl Into<String>, handler: impl Into<String>) -> Self {
        let handler = handler.into();
        if handler == DEFAULT_ENTRY {
            self.features.default_entry = true;
        }
        self.phase_handlers
            .entry(phase.into())
            .or_default()
            .push(handler);
        self
    }

    /// Declares that the unit implements [`Unit::run`].
    pub fn default_entry(mut self) -> Self {
        self.features.default_entry = true;
        self
    }

    /// Declares that the unit implements [`Unit::uninstall`].
    pub fn with_uninstall(mut self) -> Self {
        self.features.uninstall = true;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// One raw record from the registry.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Registration position, shared across marker kinds.
    pub sequence: u64,
    pub id: String,
    pub marker: MarkerKind,
    pub target: Arc<dyn Unit>,
    pub metadata: UnitMetadata,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("sequence", &self.sequence)
            .field("id", &self.id)
            .field("marker", &self.marker)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Read-only catalog of discovered units.
pub trait UnitRegistry: Send + Sync {
    fn list_units(&self, marker: MarkerKind) -> Vec<RegistryEntry>;

    /// Every component and plugin entry, in registration order.
    fn list_extensions(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = MarkerKind::EXTENSIONS
            .iter()
            .flat_map(|marker| self.list_units(*marker))
            .collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }
}

/// A registry populated by explicit registration calls.
#[derive(Default)]
pub struct StaticRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`, stamping it with the next registration position.
    pub fn register(&self, mut entry: RegistryEntry) {
        let mut entries = self.entries.write();
        entry.sequence = entries.len() as u64;
        entries.push(entry);
    }

    /// Registers `unit` as a component named `name`.
    pub fn component(&self, name: &str, unit: impl Unit, metadata: UnitMetadata) {
        self.register_as(MarkerKind::Component, name, Arc::new(unit), metadata);
    }

    /// Registers `unit` as a plugin named `name`.
    pub fn plugin(&self, name: &str, unit: impl Unit, metadata: UnitMetadata) {
        self.register_as(MarkerKind::Plugin, name, Arc::new(unit), metadata);
    }

    pub fn register_as(
        &self,
        marker: MarkerKind,
        name: &str,
        unit: Arc<dyn Unit>,
        metadata: UnitMetadata,
    ) {
        self.register(RegistryEntry {
            sequence: 0,
            id: format!("{}{}", marker.id_prefix(), name),
            marker,
            target: unit,
            metadata,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl UnitRegistry for StaticRegistry {
    fn list_units(&self, marker: MarkerKind) -> Vec<RegistryEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.marker == marker)
            .cloned()
            .collect()
    }

    fn list_extensions(&self) -> Vec<RegistryEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.marker.is_extension())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingUnit;

    /// A registry that only knows how to list one marker at a time.
    struct PerMarker(Vec<RegistryEntry>);

    impl UnitRegistry for PerMarker {
        fn list_units(&self, marker: MarkerKind) -> Vec<RegistryEntry> {
            self.0.iter().filter(|e| e.marker == marker).cloned().collect()
        }
    }

    fn entry(sequence: u64, marker: MarkerKind, name: &str) -> RegistryEntry {
        let (unit, _) = RecordingUnit::new(name);
        RegistryEntry {
            sequence,
            id: name.to_string(),
            marker,
            target: Arc::new(unit),
            metadata: UnitMetadata::core().default_entry(),
        }
    }

    #[test]
    fn test_default_listing_merges_markers_by_sequence() {
        let registry = PerMarker(vec![
            entry(0, MarkerKind::Plugin, "Trace"),
            entry(1, MarkerKind::Component, "Router"),
            entry(2, MarkerKind::Controller, "Home"),
            entry(3, MarkerKind::Plugin, "Audit"),
        ]);
        let ids: Vec<String> = registry.list_extensions().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["Trace", "Router", "Audit"]);
    }

    #[test]
    fn test_static_registry_stamps_registration_order() {
        let registry = StaticRegistry::new();
        assert!(registry.is_empty());

        let (unit, _) = RecordingUnit::new("Trace");
        registry.plugin("Trace", unit, UnitMetadata::core().default_entry());
        let (unit, _) = RecordingUnit::new("Home");
        registry.register_as(MarkerKind::Controller, "Home", Arc::new(unit), UnitMetadata::user());
        let (unit, _) = RecordingUnit::new("Router");
        registry.component("Router", unit, UnitMetadata::core().default_entry());

        assert_eq!(registry.len(), 3);
        let listed: Vec<(u64, String)> = registry
            .list_extensions()
            .into_iter()
            .map(|e| (e.sequence, e.id))
            .collect();
        assert_eq!(
            listed,
            vec![(0, "PLUGIN:Trace".to_string()), (2, "COMPONENT:Router".to_string())]
        );
    }
}
