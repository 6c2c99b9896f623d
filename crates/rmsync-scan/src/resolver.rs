//! Path-based correspondence between the device and mirror trees.

use std::sync::atomic::{AtomicUsize, Ordering};

use compact_str::CompactString;
use dashmap::DashMap;

use rmsync_core::{NodeId, SyncNode, SyncTree};

/// Lazily built `path -> node` cache over one tree.
///
/// Paths are cached the first time they are seen and never replaced, so the
/// first of two nodes with the same path wins. Because trees are append-only,
/// a miss after a complete traversal of an unchanged tree is final.
#[derive(Debug, Default)]
pub struct PathIndex {
    cache: DashMap<CompactString, NodeId>,
    /// Tree length at the last complete traversal.
    indexed_len: AtomicUsize,
}

impl PathIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the node at `path` (relative to the root) in `tree`.
    pub fn find(&self, tree: &SyncTree, path: &str) -> Option<NodeId> {
        if path.is_empty() {
            return Some(NodeId::ROOT);
        }
        if let Some(id) = self.cache.get(path) {
            return Some(*id);
        }
        if self.indexed_len.load(Ordering::Relaxed) == tree.len() {
            return None;
        }

        let mut found = None;
        for node in tree.iter() {
            let id = *self.cache.entry(node.path.clone()).or_insert(node.id);
            if found.is_none() && node.path == path {
                found = Some(id);
            }
        }
        self.indexed_len.store(tree.len(), Ordering::Relaxed);

        found
    }

    /// Record a node's path unless the path is already known.
    pub fn remember(&self, node: &SyncNode) {
        self.cache.entry(node.path.clone()).or_insert(node.id);
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Maps nodes between the device tree and the mirror tree by path.
#[derive(Debug, Default)]
pub struct Correspondence {
    device: PathIndex,
    mirror: PathIndex,
}

impl Correspondence {
    /// Create a resolver with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node in the device tree by path.
    pub fn find_on_device(&self, device: &SyncTree, path: &str) -> Option<NodeId> {
        self.device.find(device, path)
    }

    /// Find a node in the mirror tree by path.
    pub fn find_on_mirror(&self, mirror: &SyncTree, path: &str) -> Option<NodeId> {
        self.mirror.find(mirror, path)
    }

    /// The device node corresponding to a mirror node.
    pub fn on_device(&self, device: &SyncTree, mirror_node: &SyncNode) -> Option<NodeId> {
        self.find_on_device(device, &mirror_node.path)
    }

    /// The mirror node corresponding to a device node.
    pub fn on_mirror(&self, mirror: &SyncTree, device_node: &SyncNode) -> Option<NodeId> {
        self.find_on_mirror(mirror, &device_node.path)
    }

    /// Register a node freshly added to the device tree.
    pub fn remember_device(&self, node: &SyncNode) {
        self.device.remember(node);
    }
}
