//! # Catalog Adapter
//!
//! Turns raw registry entries into [`UnitDescriptor`]s: normalises ids, merges
//! configuration overrides over declared defaults, resolves `enabled`, and
//! sorts the result into the core and user tier maps.
//!
//! ## Enablement
//! - **Core** units are enabled unless explicitly disabled.
//! - **User** units are enabled if named in the activation list *or* not
//!   explicitly disabled.
//!
//! ## Collisions
//! The last discovered entry for a name wins. The map keeps the position of
//! the first declaration, and a warning is logged.

use crate::catalog::{MarkerKind, PluginConfig, RegistryEntry, UnitRegistry};
use crate::model::{Dependency, Tier, UnitDescriptor};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A unit that was discovered but left out because it is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledUnit {
    pub name: String,
    pub tier: Tier,
}

/// Result of one discovery pass over the registry.
#[derive(Debug, Default)]
pub struct Discovery {
    pub core: IndexMap<String, UnitDescriptor>,
    pub user: IndexMap<String, UnitDescriptor>,
    pub disabled: Vec<DisabledUnit>,
}

impl Discovery {
    pub fn tier(&self, tier: Tier) -> &IndexMap<String, UnitDescriptor> {
        match tier {
            Tier::Core => &self.core,
            Tier::User => &self.user,
        }
    }

    fn insert(&mut self, descriptor: UnitDescriptor) {
        let name = descriptor.name.clone();
        let (own, other) = match descriptor.tier {
            Tier::Core => (&mut self.core, &mut self.user),
            Tier::User => (&mut self.user, &mut self.core),
        };

        // A name lives in exactly one tier.
        if other.shift_remove(&name).is_some() {
            warn!(unit = %name, tier = %descriptor.tier, "Unit redefined in another tier, replacing");
        }
        if own.insert(name.clone(), descriptor).is_some() {
            warn!(unit = %name, "Unit already discovered, replacing");
        }
    }
}

pub struct CatalogAdapter {
    registry: Arc<dyn UnitRegistry>,
    config: PluginConfig,
}

impl CatalogAdapter {
    pub fn new(registry: Arc<dyn UnitRegistry>, config: PluginConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Discovers the enabled units of one tier, in declaration order.
    pub fn discover(&self, tier: Tier) -> Vec<UnitDescriptor> {
        let discovery = self.discover_all();
        discovery.tier(tier).values().cloned().collect()
    }

    /// One pass over the registry in registration order, populating both
    /// tier maps.
    pub fn discover_all(&self) -> Discovery {
        let mut discovery = Discovery::default();

        for entry in self.registry.list_extensions() {
            let Some(descriptor) = self.resolve(entry) else {
                continue;
            };

            if !descriptor.enabled {
                warn!(unit = %descriptor.name, tier = %descriptor.tier, "Unit is disabled");
                discovery.disabled.push(DisabledUnit {
                    name: descriptor.name,
                    tier: descriptor.tier,
                });
                continue;
            }

            match descriptor.tier {
                Tier::Core => info!(unit = %descriptor.name, "✓ Discovered core unit"),
                Tier::User => debug!(unit = %descriptor.name, "Discovered user unit"),
            }
            discovery.insert(descriptor);
        }

        // A later entry may have disabled a name that was enabled earlier.
        discovery
            .disabled
            .retain(|d| !discovery.core.contains_key(&d.name) && !discovery.user.contains_key(&d.name));

        discovery
    }

    /// Builds the descriptor for one entry, or `None` when the entry has
    /// nothing to orchestrate.
    fn resolve(&self, entry: RegistryEntry) -> Option<UnitDescriptor> {
        let name = normalize_id(&entry.id, entry.marker);
        if name.is_empty() {
            debug!(id = %entry.id, "Skipping registry entry without a usable name");
            return None;
        }

        let meta = entry.metadata;
        let overrides = self.config.override_for(&name);

        let enabled_flag = overrides.and_then(|o| o.enabled).or(meta.enabled);
        let enabled = match meta.tier {
            Tier::Core => enabled_flag != Some(false),
            Tier::User => self.config.is_listed(&name) || enabled_flag != Some(false),
        };

        let priority = overrides
            .and_then(|o| o.priority)
            .unwrap_or(meta.priority);

        let mut options = meta.options;
        if let Some(o) = overrides {
            options.extend(o.extra.clone());
        }

        let mut dependencies: Vec<Dependency> =
            meta.requires.into_iter().map(Dependency::required).collect();
        dependencies.extend(meta.dependencies);

        let descriptor = UnitDescriptor {
            name,
            tier: meta.tier,
            enabled,
            priority,
            version: meta.version,
            description: meta.description,
            dependencies,
            provides: meta.provides,
            conflicts: meta.conflicts,
            phase_handlers: meta.phase_handlers,
            features: meta.features,
            options,
            instance: entry.target,
        };

        if !descriptor.is_orchestratable() {
            debug!(unit = %descriptor.name, "Unit has no phase handlers or default entry, skipping");
            return None;
        }

        Some(descriptor)
    }
}

/// Strips a `COMPONENT:` / `PLUGIN:` style prefix from a registry id.
pub fn normalize_id(id: &str, marker: MarkerKind) -> String {
    let id = id.trim();
    let stripped = id
        .strip_prefix(marker.id_prefix())
        .or_else(|| {
            MarkerKind::EXTENSIONS
                .iter()
                .find_map(|m| id.strip_prefix(m.id_prefix()))
        })
        .unwrap_or(id);
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{StaticConfig, StaticRegistry, UnitMetadata};
    use crate::mock::RecordingUnit;
    use crate::model::Phase;
    use serde_json::json;

    fn adapter(registry: StaticRegistry, config: serde_json::Value) -> CatalogAdapter {
        let store = StaticConfig::new(config);
        let config = PluginConfig::load(&store).unwrap();
        CatalogAdapter::new(Arc::new(registry), config)
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("COMPONENT:Router", MarkerKind::Component), "Router");
        assert_eq!(normalize_id("PLUGIN:Trace", MarkerKind::Component), "Trace");
        assert_eq!(normalize_id("Serve", MarkerKind::Plugin), "Serve");
        assert_eq!(normalize_id("COMPONENT:", MarkerKind::Component), "");
    }

    #[test]
    fn test_splits_tiers_and_ignores_other_markers() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Router");
        registry.component("Router", unit, UnitMetadata::core().on(Phase::LoadRouter, "init"));
        let (unit, _) = RecordingUnit::new("Audit");
        registry.plugin("Audit", unit, UnitMetadata::user().default_entry());
        let (unit, _) = RecordingUnit::new("Home");
        registry.register_as(
            MarkerKind::Controller,
            "Home",
            Arc::new(unit),
            UnitMetadata::user().default_entry(),
        );

        let discovery = adapter(registry, json!({})).discover_all();
        assert_eq!(discovery.core.keys().collect::<Vec<_>>(), vec!["Router"]);
        assert_eq!(discovery.user.keys().collect::<Vec<_>>(), vec!["Audit"]);
    }

    #[test]
    fn test_drops_units_without_behavior() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Inert");
        registry.component("Inert", unit, UnitMetadata::core());

        let discovery = adapter(registry, json!({})).discover_all();
        assert!(discovery.core.is_empty());
        assert!(discovery.disabled.is_empty());
    }

    #[test]
    fn test_config_overrides_defaults() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Cache");
        registry.plugin(
            "Cache",
            unit,
            UnitMetadata::user().priority(1).option("ttl", json!(10)).default_entry(),
        );
        let (unit, _) = RecordingUnit::new("Trace");
        registry.plugin("Trace", unit, UnitMetadata::core().on(Phase::Boot, "init"));

        let discovery = adapter(
            registry,
            json!({ "plugin": { "config": {
                "Cache": { "priority": 9, "ttl": 60 },
                "Trace": { "enabled": false }
            } } }),
        )
        .discover_all();

        let cache = &discovery.user["Cache"];
        assert_eq!(cache.priority, 9);
        assert_eq!(cache.options.get("ttl"), Some(&json!(60)));
        assert!(discovery.core.is_empty());
        assert_eq!(
            discovery.disabled,
            vec![DisabledUnit { name: "Trace".into(), tier: Tier::Core }]
        );
    }

    #[test]
    fn test_user_activation_list_overrides_declared_disable() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Audit");
        registry.plugin("Audit", unit, UnitMetadata::user().enabled(false).default_entry());
        let (unit, _) = RecordingUnit::new("Metrics");
        registry.plugin("Metrics", unit, UnitMetadata::user().enabled(false).default_entry());

        let discovery = adapter(registry, json!({ "plugin": { "list": ["Audit"] } })).discover_all();
        assert!(discovery.user.contains_key("Audit"));
        assert!(!discovery.user.contains_key("Metrics"));
    }

    #[test]
    fn test_legacy_requires_become_required_dependencies() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Serve");
        registry.component(
            "Serve",
            unit,
            UnitMetadata::core().requires("Router").on(Phase::LoadServe, "init"),
        );

        let discovery = adapter(registry, json!({})).discover_all();
        let serve = &discovery.core["Serve"];
        assert_eq!(serve.dependencies.len(), 1);
        assert_eq!(serve.dependencies[0].name, "Router");
        assert_eq!(serve.dependencies[0].kind, crate::model::DependencyKind::Required);
    }

    #[test]
    fn test_last_discovered_wins() {
        let registry = StaticRegistry::new();
        let (first, _) = RecordingUnit::new("Router");
        registry.component("Router", first, UnitMetadata::core().priority(1).on(Phase::Boot, "a"));
        let (second, _) = RecordingUnit::new("Router");
        registry.component("Router", second, UnitMetadata::user().priority(2).default_entry());

        let discovery = adapter(registry, json!({})).discover_all();
        assert!(discovery.core.is_empty());
        assert_eq!(discovery.user["Router"].priority, 2);
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Router");
        registry.component("Router", unit, UnitMetadata::core().on(Phase::LoadRouter, "init"));
        let (unit, _) = RecordingUnit::new("Audit");
        registry.plugin("Audit", unit, UnitMetadata::user().default_entry());

        let adapter = adapter(registry, json!({}));
        let names = |tier| {
            adapter
                .discover(tier)
                .into_iter()
                .map(|d| (d.name, d.tier))
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Tier::Core), names(Tier::Core));
        assert_eq!(names(Tier::User), names(Tier::User));
        assert_eq!(names(Tier::Core), vec![("Router".to_string(), Tier::Core)]);
    }

    #[test]
    fn test_mixed_markers_keep_registration_order() {
        let registry = StaticRegistry::new();
        let (unit, _) = RecordingUnit::new("Trace");
        registry.plugin("Trace", unit, UnitMetadata::core().default_entry());
        let (unit, _) = RecordingUnit::new("Router");
        registry.component("Router", unit, UnitMetadata::core().default_entry());
        let (unit, _) = RecordingUnit::new("X");
        registry.plugin("X", unit, UnitMetadata::core().priority(2).default_entry());
        let (unit, _) = RecordingUnit::new("X");
        registry.component("X", unit, UnitMetadata::core().priority(1).default_entry());
        assert_eq!(registry.len(), 4);

        let discovery = adapter(registry, json!({})).discover_all();
        assert_eq!(
            discovery.core.keys().collect::<Vec<_>>(),
            vec!["Trace", "Router", "X"]
        );
        // The component was registered last, so it wins.
        assert_eq!(discovery.core["X"].priority, 1);
    }
}
