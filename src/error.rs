//! # Orchestrator Errors
//!
//! Two error families: [`UnitError`] is what unit code raises (handlers,
//! default entries, uninstall hooks, validator predicates), and
//! [`OrchestratorError`] is what the engine itself surfaces to the host.

use crate::model::Phase;
use crate::orchestrator::OrchestratorState;
use crate::validator::ValidationReport;

/// Errors raised by unit code.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("{0}")]
    Failed(String),

    /// The unit was asked to run a handler it does not implement.
    #[error("handler '{0}' is not implemented")]
    UnknownHandler(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<String> for UnitError {
    fn from(msg: String) -> Self {
        UnitError::Failed(msg)
    }
}

impl From<&str> for UnitError {
    fn from(msg: &str) -> Self {
        UnitError::Failed(msg.to_string())
    }
}

/// Errors surfaced by the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// One or more core units have unmet dependencies or active conflicts.
    #[error("{0}")]
    Validation(ValidationReport),

    /// A circular required/contract dependency among core units.
    #[error(
        "Circular dependency detected at unit '{unit}': {}\n  → Solution: Break the cycle by removing one of the dependencies",
        path.join(" -> ")
    )]
    Cycle { unit: String, path: Vec<String> },

    /// A bound phase handler failed; the rest of the phase was aborted.
    #[error("Unit '{unit}' failed while handling phase '{phase}': {source}")]
    Handler {
        unit: String,
        phase: Phase,
        #[source]
        source: UnitError,
    },

    /// A user unit's default entry failed during activation.
    #[error("Failed to load user unit '{unit}': {source}")]
    Activation {
        unit: String,
        #[source]
        source: UnitError,
    },

    #[error("Cannot {operation} while orchestrator is {state}")]
    InvalidState {
        operation: &'static str,
        state: OrchestratorState,
    },

    #[error("Invalid plugin configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;
