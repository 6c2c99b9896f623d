//! Error types for synchronization.

use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

use crate::node::{ItemId, NodeKind};

/// Errors that can occur while loading, planning or executing a sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The device could not be reached or a transport command failed.
    #[error("Connection to {host} failed: {message}")]
    Connectivity { host: String, message: String },

    /// A metadata record is malformed or lacks a required field.
    #[error("Corrupt metadata for {id}: {message}")]
    CorruptMetadata { id: ItemId, message: String },

    /// A record is neither a directory nor a document.
    #[error("Item {id} is not a directory XOR a document (type \"{item_type}\")")]
    NotExclusiveKind { id: ItemId, item_type: String },

    /// Two items of different kinds share one derived path.
    #[error("Conflicting items at {path}: {first} on one side, {second} on the other")]
    KindConflict {
        path: CompactString,
        first: NodeKind,
        second: NodeKind,
    },

    /// The external renderer failed or produced no output.
    #[error("Failed to render {path}: {message}")]
    Render { path: CompactString, message: String },

    /// An operation's precondition does not hold (e.g. unresolved parent).
    #[error("Cannot {action} {path}: {message}")]
    Precondition {
        action: &'static str,
        path: CompactString,
        message: String,
    },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The watermark file exists but does not hold a timestamp.
    #[error("Invalid sync watermark in {path}: {content:?}")]
    InvalidWatermark { path: PathBuf, content: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl SyncError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a connectivity error.
    pub fn connectivity(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a precondition error.
    pub fn precondition(
        action: &'static str,
        path: impl Into<CompactString>,
        message: impl Into<String>,
    ) -> Self {
        Self::Precondition {
            action,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error only invalidates the operation that raised it.
    ///
    /// Everything else aborts the remaining plan.
    pub fn is_item_local(&self) -> bool {
        matches!(self, Self::Render { .. } | Self::Precondition { .. })
    }

    /// Whether this error means the tree data cannot be trusted.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            Self::NotExclusiveKind { .. } | Self::KindConflict { .. }
        )
    }
}
