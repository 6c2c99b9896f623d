//! Core types and traits for rmsync.
//!
//! This crate provides the data structures shared by the rmsync crates:
//! device metadata records, the arena tree used for both the device and
//! the mirror side, planned operations, errors and configuration.

mod config;
mod error;
mod node;
mod operation;
mod record;
mod transport;
mod tree;
pub mod watermark;

pub use config::{
    DeviceConfig, DeviceConfigBuilder, SyncConfig, SyncConfigBuilder, DEFAULT_REMOTE_DIR,
    WATERMARK_FILE,
};
pub use error::SyncError;
pub use node::{
    extension_of, join_path, path_depth, ItemId, Locator, NodeId, NodeKind, SyncNode, Timestamps,
};
pub use operation::{Action, Operation, Reason};
pub use record::{ItemRecord, COLLECTION_TYPE, DOCUMENT_TYPE};
pub use transport::Transport;
pub use tree::{Side, SyncTree, Traverse, TraversalOrder, TreeStats};
pub use watermark::Watermark;
