//! # Units
//!
//! A unit is a discoverable extension registered against the host application.
//! This module defines the [`Unit`] trait implemented by unit code and the
//! [`UnitDescriptor`] the orchestrator keeps for every discovered unit.
//!
//! # Declared Capabilities
//! What a unit can do is declared as data ([`UnitFeatures`] and the
//! phase-handler map), never inferred by inspecting the instance. The
//! orchestrator only calls [`Unit::run`] when `features.default_entry` is set
//! and [`Unit::uninstall`] when `features.uninstall` is set.

use crate::error::UnitError;
use crate::model::{Application, Phase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handler name that refers to the unit's default entry method.
pub const DEFAULT_ENTRY: &str = "run";

/// Merged unit options (declared defaults overridden by configuration).
pub type UnitOptions = Map<String, Value>;

/// Phase name → ordered handler names.
pub type PhaseHandlers = BTreeMap<String, Vec<String>>;

/// Trust tier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Framework-trusted infrastructure, strictly validated before startup.
    Core,
    /// Application-authored extension, loaded best-effort after core.
    #[default]
    User,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Core => f.write_str("core"),
            Tier::User => f.write_str("user"),
        }
    }
}

/// Behavior implemented by a unit instance.
///
/// All methods are async and receive the live [`Application`]. Every method
/// has a default so a unit only implements what it declares.
#[async_trait]
pub trait Unit: Send + Sync + 'static {
    /// Runs the handler named `handler`, bound to `phase`.
    async fn handle(
        &self,
        _phase: Phase,
        handler: &str,
        _app: &Application,
    ) -> Result<(), UnitError> {
        Err(UnitError::UnknownHandler(handler.to_string()))
    }

    /// The default entry method for single-entry-point units.
    async fn run(&self, _options: &UnitOptions, _app: &Application) -> Result<(), UnitError> {
        Ok(())
    }

    /// Releases whatever the unit set up. Called during teardown.
    async fn uninstall(&self, _app: &Application) -> Result<(), UnitError> {
        Ok(())
    }
}

/// A predicate evaluated against the live application.
///
/// `Ok(false)` and `Err(_)` both mean "not satisfied".
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Application) -> Result<bool, UnitError> + Send + Sync>);

impl Predicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Application) -> Result<bool, UnitError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn check(&self, app: &Application) -> Result<bool, UnitError> {
        (self.0)(app)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Another unit, by name, must be enabled.
    Required,
    /// Nice to have; absence is only a warning.
    Optional,
    /// Some core unit must provide the named capability.
    Contract,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Required => f.write_str("required"),
            DependencyKind::Optional => f.write_str("optional"),
            DependencyKind::Contract => f.write_str("contract"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
    pub validator: Option<Predicate>,
    pub error_message: Option<String>,
}

impl Dependency {
    fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            validator: None,
            error_message: None,
        }
    }

    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Required)
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Optional)
    }

    pub fn contract(capability: impl Into<String>) -> Self {
        Self::new(capability, DependencyKind::Contract)
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Application) -> Result<bool, UnitError> + Send + Sync + 'static,
    {
        self.validator = Some(Predicate::new(f));
        self
    }

    pub fn with_error_message(mut self, msg: impl Into<String>) -> Self {
        self.error_message = Some(msg.into());
        self
    }

    /// Whether this dependency constrains load order (required and contract do).
    pub fn is_ordering(&self) -> bool {
        matches!(self.kind, DependencyKind::Required | DependencyKind::Contract)
    }
}

/// A named, versioned guarantee a unit claims to satisfy once active.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub validator: Option<Predicate>,
}

impl Capability {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            validator: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Application) -> Result<bool, UnitError> + Send + Sync + 'static,
    {
        self.validator = Some(Predicate::new(f));
        self
    }
}

/// Optional behaviors a unit declares it implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitFeatures {
    /// The unit implements [`Unit::run`].
    pub default_entry: bool,
    /// The unit implements [`Unit::uninstall`].
    pub uninstall: bool,
}

/// Everything the orchestrator knows about one discovered unit.
#[derive(Clone)]
pub struct UnitDescriptor {
    pub name: String,
    pub tier: Tier,
    pub enabled: bool,
    pub priority: i32,
    pub version: Option<String>,
    pub description: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub provides: Vec<Capability>,
    pub conflicts: Vec<String>,
    pub phase_handlers: PhaseHandlers,
    pub features: UnitFeatures,
    pub options: UnitOptions,
    pub instance: Arc<dyn Unit>,
}

impl UnitDescriptor {
    pub fn has_explicit_bindings(&self) -> bool {
        self.phase_handlers.values().any(|handlers| !handlers.is_empty())
    }

    /// Whether the default entry is already bound to some phase explicitly.
    pub fn default_entry_bound(&self) -> bool {
        self.phase_handlers
            .values()
            .any(|handlers| handlers.iter().any(|h| h == DEFAULT_ENTRY))
    }

    /// A unit whose only behavior is its default entry method.
    pub fn is_entry_only(&self) -> bool {
        self.features.default_entry && !self.has_explicit_bindings()
    }

    /// Whether the unit has anything for the orchestrator to drive.
    pub fn is_orchestratable(&self) -> bool {
        self.features.default_entry || self.has_explicit_bindings()
    }

    pub fn info(&self) -> UnitInfo {
        UnitInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tier: self.tier,
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("provides", &self.provides)
            .field("conflicts", &self.conflicts)
            .field("phase_handlers", &self.phase_handlers)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Serializable summary of a unit, for diagnostics and monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInfo {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tier: Tier,
    pub priority: i32,
    pub enabled: bool,
}
