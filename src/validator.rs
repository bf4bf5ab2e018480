//! # Dependency Validator
//!
//! Checks every unit's required, optional and contract dependencies and its
//! conflict declarations against the current catalog snapshot.
//!
//! Severity is tier-specific:
//! - **Core** validation is a hard gate. Every problem is collected into one
//!   [`ValidationReport`], and a non-clean report aborts bootstrap.
//! - **User** validation is best-effort. A user unit with an unmet dependency
//!   or an active conflict is skipped with a warning.

use crate::capability::CapabilityIndex;
use crate::model::{Application, Dependency, DependencyKind, UnitDescriptor};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

type UnitMap = IndexMap<String, UnitDescriptor>;

#[derive(Debug, Clone)]
pub struct MissingDependency {
    pub dependency: Dependency,
    /// Remediation hint for the operator.
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiedContract {
    pub capability: String,
    pub reason: String,
}

/// Outcome of validating a single unit.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub unit: String,
    pub satisfied: bool,
    pub missing_required: Vec<MissingDependency>,
    pub unsatisfied_contracts: Vec<UnsatisfiedContract>,
    pub active_conflicts: Vec<String>,
    /// Optional dependencies that are absent. Never affects `satisfied`.
    pub missing_optional: Vec<String>,
}

/// Aggregated outcome of validating a whole tier. Only units with problems
/// are kept.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub failures: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failing_units(&self) -> Vec<&str> {
        self.failures.iter().map(|r| r.unit.as_str()).collect()
    }

    pub fn get(&self, unit: &str) -> Option<&ValidationResult> {
        self.failures.iter().find(|r| r.unit == unit)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Core unit validation failed for {} unit(s):",
            self.failures.len()
        )?;
        for result in &self.failures {
            writeln!(f)?;
            writeln!(f, "[{}]", result.unit)?;
            for missing in &result.missing_required {
                writeln!(
                    f,
                    "  ✗ requires unit '{}', which is not available",
                    missing.dependency.name
                )?;
                writeln!(f, "    → Solution: {}", missing.hint)?;
            }
            for contract in &result.unsatisfied_contracts {
                writeln!(
                    f,
                    "  ✗ contract '{}' is not satisfied: {}",
                    contract.capability, contract.reason
                )?;
                writeln!(
                    f,
                    "    → Solution: Enable a core unit that provides '{}' or disable '{}'",
                    contract.capability, result.unit
                )?;
            }
            for other in &result.active_conflicts {
                writeln!(f, "  ✗ conflicts with enabled unit '{}'", other)?;
                writeln!(
                    f,
                    "    → Solution: Disable either '{}' or '{}'",
                    result.unit, other
                )?;
            }
        }
        Ok(())
    }
}

/// Validates units against a catalog snapshot and a capability index.
pub struct DependencyValidator<'a> {
    app: &'a Application,
    index: &'a CapabilityIndex,
}

impl<'a> DependencyValidator<'a> {
    pub fn new(app: &'a Application, index: &'a CapabilityIndex) -> Self {
        Self { app, index }
    }

    /// Validates one unit.
    ///
    /// `peers` is the unit's own tier, `trusted` an optional more-trusted tier
    /// whose units also satisfy required dependencies. Conflicts are only
    /// checked within `peers`. Names in `excluded` count as absent.
    pub fn validate_unit(
        &self,
        unit: &UnitDescriptor,
        peers: &UnitMap,
        trusted: Option<&UnitMap>,
        excluded: &HashSet<String>,
    ) -> ValidationResult {
        let present = |name: &str| {
            !excluded.contains(name)
                && (peers.contains_key(name) || trusted.is_some_and(|t| t.contains_key(name)))
        };

        let mut result = ValidationResult {
            unit: unit.name.clone(),
            ..ValidationResult::default()
        };

        for dep in &unit.dependencies {
            match dep.kind {
                DependencyKind::Required => {
                    if !present(&dep.name) {
                        let hint = match &dep.error_message {
                            Some(msg) => format!(
                                "{msg} (enable '{}' in the plugin configuration or disable '{}')",
                                dep.name, unit.name
                            ),
                            None => format!(
                                "Enable '{}' in the plugin configuration or disable '{}'",
                                dep.name, unit.name
                            ),
                        };
                        result.missing_required.push(MissingDependency {
                            dependency: dep.clone(),
                            hint,
                        });
                    }
                }
                DependencyKind::Optional => {
                    if !present(&dep.name) && !self.index.contains(&dep.name) {
                        warn!(
                            unit = %unit.name,
                            dependency = %dep.name,
                            "{}",
                            dep.error_message.as_deref().unwrap_or("Optional dependency not available")
                        );
                        result.missing_optional.push(dep.name.clone());
                    }
                }
                DependencyKind::Contract => {
                    if let Some(reason) = self.check_contract(dep, excluded) {
                        result.unsatisfied_contracts.push(UnsatisfiedContract {
                            capability: dep.name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        for other in &unit.conflicts {
            if other != &unit.name && peers.contains_key(other) && !excluded.contains(other) {
                result.active_conflicts.push(other.clone());
            }
        }

        result.satisfied = result.missing_required.is_empty()
            && result.unsatisfied_contracts.is_empty()
            && result.active_conflicts.is_empty();
        result
    }

    /// Returns the reason a contract is unsatisfied, or `None` when it holds.
    fn check_contract(&self, dep: &Dependency, excluded: &HashSet<String>) -> Option<String> {
        let available = self
            .index
            .providers(&dep.name)
            .iter()
            .any(|p| !excluded.contains(&p.unit));
        if !available {
            return Some(dep.error_message.clone().unwrap_or_else(|| {
                format!("no enabled core unit provides capability '{}'", dep.name)
            }));
        }

        let validator = dep.validator.as_ref()?;
        match validator.check(self.app) {
            Ok(true) => None,
            Ok(false) => Some(dep.error_message.clone().unwrap_or_else(|| {
                format!("validator rejected capability '{}'", dep.name)
            })),
            Err(e) => Some(
                dep.error_message
                    .clone()
                    .unwrap_or_else(|| format!("validator for '{}' failed: {}", dep.name, e)),
            ),
        }
    }

    /// Hard-gate validation of the core tier.
    pub fn validate_core(&self, core: &UnitMap) -> ValidationReport {
        let none = HashSet::new();
        let failures = core
            .values()
            .map(|unit| self.validate_unit(unit, core, None, &none))
            .filter(|result| !result.satisfied)
            .collect();
        ValidationReport { failures }
    }

    /// Best-effort validation of the user tier.
    ///
    /// Returns the names of user units to skip. Skips cascade: a unit that
    /// requires a skipped unit is skipped too.
    pub fn validate_user(&self, core: &UnitMap, user: &UnitMap) -> Vec<String> {
        let mut skipped: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();

        loop {
            let mut changed = false;
            let pending: Vec<&UnitDescriptor> =
                user.values().filter(|u| !skipped.contains(&u.name)).collect();
            for unit in pending {
                let result = self.validate_unit(unit, user, Some(core), &skipped);
                if result.satisfied {
                    continue;
                }
                for missing in &result.missing_required {
                    warn!(unit = %unit.name, dependency = %missing.dependency.name, hint = %missing.hint,
                        "Skipping user unit: required dependency not available");
                }
                for contract in &result.unsatisfied_contracts {
                    warn!(unit = %unit.name, capability = %contract.capability, reason = %contract.reason,
                        "Skipping user unit: contract not satisfied");
                }
                for other in &result.active_conflicts {
                    warn!(unit = %unit.name, conflict = %other, "Skipping user unit: conflicts with enabled unit");
                }
                skipped.insert(unit.name.clone());
                order.push(unit.name.clone());
                changed = true;
            }
            if !changed {
                break;
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticConfig;
    use crate::mock::descriptor;
    use crate::model::{Capability, Tier};
    use std::sync::Arc;

    fn app() -> Application {
        Application::new("test", Arc::new(StaticConfig::empty()))
    }

    fn map(units: Vec<UnitDescriptor>) -> UnitMap {
        units.into_iter().map(|u| (u.name.clone(), u)).collect()
    }

    #[test]
    fn test_missing_required_fails_core() {
        let mut serve = descriptor("Serve", Tier::Core);
        serve.dependencies.push(Dependency::required("Router"));
        let core = map(vec![serve]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);

        assert!(!report.is_clean());
        let result = report.get("Serve").unwrap();
        assert_eq!(result.missing_required[0].dependency.name, "Router");
        assert!(result.missing_required[0].hint.contains("Enable 'Router'"));
        assert!(report.to_string().contains("requires unit 'Router'"));
    }

    #[test]
    fn test_contract_satisfied_by_core_provider() {
        let mut api = descriptor("Api", Tier::Core);
        api.dependencies.push(Dependency::contract("router"));
        let core = map(vec![api.clone()]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        let result = report.get("Api").unwrap();
        assert_eq!(result.unsatisfied_contracts[0].capability, "router");

        let mut router = descriptor("Router", Tier::Core);
        router.provides.push(Capability::new("router", "1.0.0"));
        let core = map(vec![api, router]);
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        assert!(report.is_clean(), "{report}");
    }

    #[test]
    fn test_contract_validator_predicate() {
        let mut api = descriptor("Api", Tier::Core);
        api.dependencies
            .push(Dependency::contract("router").with_validator(|app| Ok(app.contains("router"))));
        let mut strict = descriptor("Strict", Tier::Core);
        strict.dependencies.push(
            Dependency::contract("router")
                .with_validator(|_| Err("router misconfigured".into())),
        );
        let mut router = descriptor("Router", Tier::Core);
        router.provides.push(Capability::new("router", "1.0.0"));
        let core = map(vec![api, strict, router]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        assert_eq!(report.failing_units(), vec!["Api", "Strict"]);
        assert!(report.get("Api").unwrap().unsatisfied_contracts[0]
            .reason
            .contains("validator rejected"));
        assert!(report.get("Strict").unwrap().unsatisfied_contracts[0]
            .reason
            .contains("router misconfigured"));

        app.set("router", serde_json::Value::Bool(true));
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        assert_eq!(report.failing_units(), vec!["Strict"]);
    }

    #[test]
    fn test_mutual_conflicts_list_both_units() {
        let mut a = descriptor("A", Tier::Core);
        a.conflicts.push("B".into());
        let mut b = descriptor("B", Tier::Core);
        b.conflicts.push("A".into());
        let core = map(vec![a, b]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        assert_eq!(report.failing_units(), vec!["A", "B"]);
        assert_eq!(report.get("A").unwrap().active_conflicts, vec!["B"]);
    }

    #[test]
    fn test_optional_dependency_never_fails() {
        let mut serve = descriptor("Serve", Tier::Core);
        serve.dependencies.push(Dependency::optional("router"));
        let core = map(vec![serve]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let validator = DependencyValidator::new(&app, &index);
        let report = validator.validate_core(&core);
        assert!(report.is_clean());

        let result = validator.validate_unit(&core["Serve"], &core, None, &HashSet::new());
        assert_eq!(result.missing_optional, vec!["router"]);
    }

    #[test]
    fn test_user_skips_cascade() {
        let mut a = descriptor("a", Tier::User);
        a.dependencies.push(Dependency::required("missing"));
        let mut b = descriptor("b", Tier::User);
        b.dependencies.push(Dependency::required("a"));
        let mut c = descriptor("c", Tier::User);
        c.dependencies.push(Dependency::required("Router"));
        let user = map(vec![a, b, c]);
        let core = map(vec![descriptor("Router", Tier::Core)]);

        let app = app();
        let index = CapabilityIndex::build(core.values().chain(user.values()));
        let skipped = DependencyValidator::new(&app, &index).validate_user(&core, &user);
        assert_eq!(skipped, vec!["a", "b"]);
    }

    #[test]
    fn test_user_capability_does_not_satisfy_core_contract() {
        let mut api = descriptor("Api", Tier::Core);
        api.dependencies.push(Dependency::contract("cache"));
        let mut cache = descriptor("Cache", Tier::User);
        cache.provides.push(Capability::new("cache", "1.0.0"));
        let core = map(vec![api]);

        let app = app();
        let index = CapabilityIndex::build(core.values());
        let report = DependencyValidator::new(&app, &index).validate_core(&core);
        assert_eq!(report.failing_units(), vec!["Api"]);

        // ...while the same capability is visible to other user units.
        let mut consumer = descriptor("Consumer", Tier::User);
        consumer.dependencies.push(Dependency::contract("cache"));
        let user = map(vec![cache, consumer]);
        let index = CapabilityIndex::build(core.values().chain(user.values()));
        let skipped = DependencyValidator::new(&app, &index).validate_user(&core, &user);
        assert!(skipped.is_empty());
    }
}
