//! Typed error hierarchy for the usher workflow engine.
//!
//! Three top-level enums cover the three subsystems:
//! - `WorkflowError`: transition legality, action failures, phase lookup
//! - `ChainError`: phase chain composition failures
//! - `StateError`: persisted project document load/save failures
//!
//! Every failure is returned to the caller as a value carrying enough
//! context (state, event, phase name, path) to render a precise message.
//! The engine never logs in place of returning and never retries; retry
//! policy belongs to the caller.

use thiserror::Error;

use crate::phases::{Event, PhaseName, State};

/// Errors from machine evaluation and workflow-level phase lookup.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The event is not permitted from the current state, either because
    /// no transition is registered or because every registered guard
    /// evaluated false. Always recoverable: the machine is unchanged.
    #[error("No transition permitted from '{state}' on '{event}'")]
    InvalidTransition { state: State, event: Event },

    /// An entry, exit, or transition action failed while firing. The
    /// transition was rolled back and no state change is observable.
    #[error("Action failed while firing '{event}' from '{state}': {source}")]
    ActionFailed {
        state: State,
        event: Event,
        #[source]
        source: anyhow::Error,
    },

    /// A command referenced a phase the active project type does not have.
    #[error("Unknown phase '{name}' for this project type")]
    UnknownPhase { name: String },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Errors from composing an ordered phase list into a machine.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Cannot build a phase chain from an empty phase list")]
    Empty,

    #[error("Duplicate phase '{name}' in chain")]
    DuplicatePhase { name: PhaseName },
}

/// Errors from the persisted-state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("No project document at {path}; run 'usher init' first")]
    NotInitialized { path: std::path::PathBuf },

    #[error("Failed to access project document at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but cannot be parsed into the expected shape.
    /// Fatal for the current command; the engine never attempts repair.
    #[error("Corrupt project document at {path}: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize project document: {source}")]
    Serialize {
        #[source]
        source: serde_yaml::Error,
    },
}
