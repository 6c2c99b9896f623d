//! Tree building for rmsync.
//!
//! This crate turns the two sides of a synchronization into comparable
//! trees and maps between them:
//!
//! - [`MetadataStore`] refreshes and parses the device's flat metadata records
//! - [`DeviceTreeBuilder`] reconstructs the device hierarchy from parent links
//! - [`MirrorScanner`] walks the local mirror directory with jwalk
//! - [`Correspondence`] finds the partner of a node on the other side by path
//!
//! # Example
//!
//! ```rust,no_run
//! use rmsync_scan::{Correspondence, DeviceTreeBuilder, MetadataStore, MirrorScanner};
//! use rmsync_core::SyncConfig;
//!
//! let config = SyncConfig::new("/home/me/remarkable");
//! let store = MetadataStore::open(&config.metadata_dir).unwrap();
//! let device = DeviceTreeBuilder::new(&config).build(&store).unwrap();
//! let mirror = MirrorScanner::new().scan(&config.mirror_root).unwrap();
//!
//! let resolver = Correspondence::new();
//! for node in device.iter() {
//!     let partner = resolver.on_mirror(&mirror, node);
//!     println!("{} -> {:?}", node.path, partner);
//! }
//! ```

mod device;
mod mirror;
mod resolver;
mod store;

pub use device::DeviceTreeBuilder;
pub use mirror::{timestamps_of, MirrorScanner};
pub use resolver::{Correspondence, PathIndex};
pub use store::{MetadataStore, CONTENT_EXTENSION, METADATA_EXTENSION};

// Re-export core types for convenience
pub use rmsync_core::{
    ItemId, ItemRecord, Locator, NodeId, NodeKind, Side, SyncConfig, SyncError, SyncNode,
    SyncTree, Timestamps, TraversalOrder,
};
