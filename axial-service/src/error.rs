// Expansion Errors
// Error kinds raised while turning a project definition into build variants

use std::fmt;
use thiserror::Error;

/// Result type for expansion operations
pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// The kind of definition that was declared twice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Axis,
    AxisValue { axis: String },
    Matrix,
    Variant,
    Task,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Axis => write!(f, "axis"),
            DefinitionKind::AxisValue { axis } => write!(f, "value of axis '{}'", axis),
            DefinitionKind::Matrix => write!(f, "matrix"),
            DefinitionKind::Variant => write!(f, "build variant"),
            DefinitionKind::Task => write!(f, "task"),
        }
    }
}

/// Errors that can occur while expanding a project
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("unknown axis '{axis}'")]
    UnknownAxis { axis: String },

    #[error("unknown value '{value}' for axis '{axis}'")]
    UnknownAxisValue { axis: String, value: String },

    #[error("duplicate {kind} '{name}'")]
    DuplicateDefinition { kind: DefinitionKind, name: String },

    #[error("invalid matrix '{matrix}': {reason}")]
    InvalidMatrix { matrix: String, reason: String },

    #[error("task '{task}' in variant '{variant}' depends on {selector}: {reason}")]
    DanglingDependency {
        variant: String,
        task: String,
        selector: String,
        reason: String,
    },

    #[error("unknown task '{task}' referenced by {referenced_by}")]
    UnknownTask { task: String, referenced_by: String },

    #[error("expansion of matrix '{matrix}' did not complete: {message}")]
    Internal { matrix: String, message: String },
}

impl ExpansionError {
    pub fn unknown_axis(axis: impl Into<String>) -> Self {
        Self::UnknownAxis { axis: axis.into() }
    }

    pub fn unknown_value(axis: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownAxisValue {
            axis: axis.into(),
            value: value.into(),
        }
    }

    pub fn duplicate(kind: DefinitionKind, name: impl Into<String>) -> Self {
        Self::DuplicateDefinition {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_matrix(matrix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMatrix {
            matrix: matrix.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is confined to a single matrix and may be isolated
    /// without rejecting the whole project.
    pub fn is_matrix_scoped(&self) -> bool {
        matches!(
            self,
            ExpansionError::UnknownAxis { .. }
                | ExpansionError::UnknownAxisValue { .. }
                | ExpansionError::InvalidMatrix { .. }
                | ExpansionError::UnknownTask { .. }
                | ExpansionError::Internal { .. }
        )
    }
}
