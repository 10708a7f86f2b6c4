//! Error types for the panel core.
//!
//! All errors are strongly typed using thiserror. Validation failures are
//! values returned from the assembler, never control flow.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalogue::VariableId;

/// Names one of the three user-editable selection sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionField {
    /// Observed variables with a fixed state.
    Evidence,
    /// Variables the analysis computes.
    Target,
    /// Intervention set used by MAP independence.
    R,
}

impl fmt::Display for SelectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Evidence => "Evidence",
            Self::Target => "Target",
            Self::R => "R",
        };
        f.write_str(s)
    }
}

/// Errors raised while loading a model into a catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Failed to read model file '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("Uploaded model '{filename}' could not be decoded: {reason}")]
    InvalidUpload {
        filename: String,
        reason: String,
    },

    #[error("Malformed model: {reason}")]
    Malformed {
        reason: String,
    },

    #[error("Variable '{name}' is declared more than once")]
    DuplicateVariable {
        name: String,
    },

    #[error("Variable '{variable}' declares state '{state}' more than once")]
    DuplicateState {
        variable: String,
        state: String,
    },

    #[error("Variable '{variable}' has no states")]
    EmptyStates {
        variable: String,
    },

    #[error("Variable '{variable}' declares {declared} states but lists {actual}")]
    StateCountMismatch {
        variable: String,
        declared: usize,
        actual: usize,
    },

    #[error("Model declares no variables")]
    EmptyNetwork,

    #[error("No default model is configured")]
    NoDefaultModel,

    #[error("Variable not found in catalogue: {0}")]
    UnknownVariable(VariableId),
}

/// Reasons an analysis request is rejected before dispatch.
///
/// Checked in a fixed order; the first failure wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No model is loaded; upload a .bif file or use the default network")]
    NoModelLoaded,

    #[error("Please select at least one variable in {field}")]
    MissingSelection {
        field: SelectionField,
    },

    #[error("{first} and {second} selections overlap")]
    OverlapError {
        first: SelectionField,
        second: SelectionField,
    },

    #[error("{field} variable '{variable}' is not part of the loaded model")]
    UnknownVariable {
        field: SelectionField,
        variable: VariableId,
    },

    #[error("'{value}' is not a state of evidence variable '{variable}'")]
    InvalidEvidenceValue {
        variable: VariableId,
        value: String,
    },
}

/// Errors reported by the inference engine collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Impossible evidence")]
    ImpossibleEvidence,

    #[error("Computation failed: {reason}")]
    ComputationFailure {
        reason: String,
    },
}

impl EngineError {
    /// Creates a generic computation failure.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::ComputationFailure {
            reason: reason.into(),
        }
    }
}

/// Errors from the engine dispatch worker pool.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Engine queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Engine worker disconnected")]
    Disconnected,

    #[error("Engine call timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type for the panel core.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Unknown session: {id}")]
    UnknownSession {
        id: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl PanelError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a catalogue error.
    #[must_use]
    pub const fn is_catalogue(&self) -> bool {
        matches!(self, Self::Catalogue(_))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an engine error.
    #[must_use]
    pub const fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }

    /// Returns true if this is a dispatch error.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Every failure is terminal for the trigger that produced it; the user
    /// adjusts the selection and triggers again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_missing_selection() {
        let err = ValidationError::MissingSelection {
            field: SelectionField::R,
        };
        let msg = format!("{err}");
        assert!(msg.contains("in R"));
    }

    #[test]
    fn test_validation_error_overlap() {
        let err = ValidationError::OverlapError {
            first: SelectionField::Evidence,
            second: SelectionField::Target,
        };
        assert_eq!(format!("{err}"), "Evidence and Target selections overlap");
    }

    #[test]
    fn test_validation_error_invalid_value() {
        let err = ValidationError::InvalidEvidenceValue {
            variable: VariableId::new("A"),
            value: "x".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("'x'"));
        assert!(msg.contains("'A'"));
    }

    #[test]
    fn test_catalogue_error_state_mismatch() {
        let err = CatalogueError::StateCountMismatch {
            variable: "Rain".to_string(),
            declared: 3,
            actual: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Rain"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_panel_error_from_validation() {
        let err: PanelError = ValidationError::NoModelLoaded.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_panel_error_from_engine() {
        let err: PanelError = EngineError::ImpossibleEvidence.into();
        assert!(err.is_engine());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_panel_error_from_dispatch() {
        let err: PanelError = DispatchError::Timeout { duration_ms: 250 }.into();
        assert!(err.is_dispatch());
        assert!(format!("{err}").contains("250ms"));
    }

    #[test]
    fn test_panel_error_internal() {
        let err = PanelError::internal("unexpected state");
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_selection_field_display() {
        assert_eq!(SelectionField::Evidence.to_string(), "Evidence");
        assert_eq!(SelectionField::R.to_string(), "R");
    }
}
