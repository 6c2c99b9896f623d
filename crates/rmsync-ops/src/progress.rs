//! Progress reporting types for sync execution.

use serde::{Deserialize, Serialize};

use rmsync_core::{Action, Operation};

use crate::OperationError;

/// Event broadcast by the executor.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// An operation is about to start.
    Progress(SyncProgress),
    /// Execution finished (or was aborted).
    Complete(ExecutionReport),
}

/// Progress information for an ongoing sync.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    /// Number of operations finished, successfully or not.
    pub completed: usize,
    /// Total number of planned operations.
    pub total: usize,
    /// Bytes sent to the device so far.
    pub bytes_uploaded: u64,
    /// The operation currently being executed.
    pub current: Option<Operation>,
    /// Per-item errors encountered so far.
    pub errors: Vec<OperationError>,
}

impl SyncProgress {
    /// Create a new progress tracker for a plan of `total` operations.
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            bytes_uploaded: 0,
            current: None,
            errors: Vec::new(),
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check if any operation failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Add an error to the progress.
    pub fn add_error(&mut self, error: OperationError) {
        self.errors.push(error);
    }

    /// Update the operation being executed.
    pub fn set_current(&mut self, operation: Option<Operation>) {
        self.current = operation;
    }

    /// Increment the completed count and add uploaded bytes.
    pub fn complete(&mut self, bytes: u64) {
        self.completed += 1;
        self.bytes_uploaded += bytes;
    }
}

/// Result of executing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Number of successful PULLs.
    pub pulled: usize,
    /// Number of successful PUSHes.
    pub pushed: usize,
    /// Number of successful DROPs.
    pub dropped: usize,
    /// Bytes sent to the device.
    pub bytes_uploaded: u64,
    /// Operations that failed without stopping the run.
    pub errors: Vec<OperationError>,
    /// The failure that stopped the run, if any.
    pub aborted: Option<OperationError>,
    /// Watermark written after execution; `None` when it was withheld.
    pub watermark: Option<i64>,
    /// Whether the device interface was restarted.
    pub restarted: bool,
}

impl ExecutionReport {
    /// Count a successful operation.
    pub fn record(&mut self, action: Action, bytes: u64) {
        match action {
            Action::Pull => self.pulled += 1,
            Action::Push => self.pushed += 1,
            Action::Drop => self.dropped += 1,
        }
        self.bytes_uploaded += bytes;
    }

    /// Number of failed operations, including the one that aborted the run.
    pub fn failed(&self) -> usize {
        self.errors.len() + usize::from(self.aborted.is_some())
    }

    /// Check if every operation succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.aborted.is_none()
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        let done = format!(
            "pulled {}, pushed {} and dropped {}",
            self.pulled, self.pushed, self.dropped
        );
        match self.failed() {
            0 => done,
            failed => format!("{done}, {failed} failed"),
        }
    }
}
