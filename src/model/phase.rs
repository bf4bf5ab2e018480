//! # Lifecycle Phases
//!
//! The closed, ordered set of named points in the host application's lifetime
//! that unit handlers can be bound to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named point in the application's startup/shutdown sequence.
///
/// The declaration order is the emission order during startup. [`Phase::Stop`]
/// is never part of the startup sequence; it fires only on termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Boot,
    Configure,
    LoadComponents,
    LoadPlugins,
    LoadMiddleware,
    LoadServices,
    LoadControllers,
    LoadRouter,
    LoadServe,
    Ready,
    Start,
    Stop,
}

impl Phase {
    /// Every phase, in registry order.
    pub const ALL: [Phase; 12] = [
        Phase::Boot,
        Phase::Configure,
        Phase::LoadComponents,
        Phase::LoadPlugins,
        Phase::LoadMiddleware,
        Phase::LoadServices,
        Phase::LoadControllers,
        Phase::LoadRouter,
        Phase::LoadServe,
        Phase::Ready,
        Phase::Start,
        Phase::Stop,
    ];

    /// Phases emitted by the host during a normal startup, in order.
    pub const STARTUP: [Phase; 11] = [
        Phase::Boot,
        Phase::Configure,
        Phase::LoadComponents,
        Phase::LoadPlugins,
        Phase::LoadMiddleware,
        Phase::LoadServices,
        Phase::LoadControllers,
        Phase::LoadRouter,
        Phase::LoadServe,
        Phase::Ready,
        Phase::Start,
    ];

    /// The phase single-entry units are bound to when they declare nothing else.
    pub const DEFAULT: Phase = Phase::Ready;

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Boot => "boot",
            Phase::Configure => "configure",
            Phase::LoadComponents => "load-components",
            Phase::LoadPlugins => "load-plugins",
            Phase::LoadMiddleware => "load-middleware",
            Phase::LoadServices => "load-services",
            Phase::LoadControllers => "load-controllers",
            Phase::LoadRouter => "load-router",
            Phase::LoadServe => "load-serve",
            Phase::Ready => "ready",
            Phase::Start => "start",
            Phase::Stop => "stop",
        }
    }

    pub fn is_startup(&self) -> bool {
        *self != Phase::Stop
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a handler binding names a phase outside the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle phase: {0}")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}
