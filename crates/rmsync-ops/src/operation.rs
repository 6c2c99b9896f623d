//! Per-operation failures.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use rmsync_core::{Action, Operation};

/// An error that occurred while executing one planned operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// The action that failed.
    pub action: Action,
    /// The path the action was applied to.
    pub path: CompactString,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(action: Action, path: impl Into<CompactString>, message: impl Into<String>) -> Self {
        Self {
            action,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error for a planned operation.
    pub fn for_operation(operation: &Operation, message: impl Into<String>) -> Self {
        Self::new(operation.action, operation.path.clone(), message)
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.action, self.path, self.message)
    }
}
