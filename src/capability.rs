//! # Capability Index
//!
//! Groups the capabilities declared by a set of units by capability name.
//! Pure aggregation: duplicate providers are all kept and nothing is
//! validated here.
//!
//! The core index is built once per bootstrap cycle from enabled core units
//! only, so user-provided capabilities can never satisfy a core contract.

use crate::model::{Capability, UnitDescriptor};
use indexmap::IndexMap;

/// A capability together with the unit that provides it.
#[derive(Debug, Clone)]
pub struct Provider {
    pub unit: String,
    pub capability: Capability,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    entries: IndexMap<String, Vec<Provider>>,
}

impl CapabilityIndex {
    pub fn build<'a>(units: impl IntoIterator<Item = &'a UnitDescriptor>) -> Self {
        let mut entries: IndexMap<String, Vec<Provider>> = IndexMap::new();
        for unit in units.into_iter().filter(|u| u.enabled) {
            for capability in &unit.provides {
                entries
                    .entry(capability.name.clone())
                    .or_default()
                    .push(Provider {
                        unit: unit.name.clone(),
                        capability: capability.clone(),
                    });
            }
        }
        Self { entries }
    }

    pub fn providers(&self, capability: &str) -> &[Provider] {
        self.entries
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.entries.contains_key(capability)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct capability names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::descriptor;
    use crate::model::Tier;

    #[test]
    fn test_groups_providers_by_name() {
        let mut router = descriptor("Router", Tier::Core);
        router.provides.push(Capability::new("router", "2.0.0"));
        let mut alt = descriptor("AltRouter", Tier::Core);
        alt.provides.push(Capability::new("router", "1.0.0"));
        let mut trace = descriptor("Trace", Tier::Core);
        trace.provides.push(Capability::new("trace", "2.0.0"));

        let index = CapabilityIndex::build([&router, &alt, &trace]);
        assert_eq!(index.len(), 2);
        let units: Vec<_> = index.providers("router").iter().map(|p| p.unit.as_str()).collect();
        assert_eq!(units, vec!["Router", "AltRouter"]);
        assert!(index.contains("trace"));
        assert!(index.providers("server").is_empty());
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["router", "trace"]);
    }

    #[test]
    fn test_skips_disabled_units() {
        let mut router = descriptor("Router", Tier::Core);
        router.provides.push(Capability::new("router", "2.0.0"));
        router.enabled = false;

        let index = CapabilityIndex::build([&router]);
        assert!(index.is_empty());
    }
}
