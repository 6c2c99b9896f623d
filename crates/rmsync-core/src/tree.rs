//! Arena-backed item tree and its traversal.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::node::{join_path, Locator, NodeId, NodeKind, SyncNode, Timestamps};

/// Which side of the synchronization a tree describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Side {
    /// Reconstructed from the device's metadata records.
    #[strum(serialize = "device")]
    Device,
    /// Scanned from the local mirror directory.
    #[strum(serialize = "mirror")]
    Mirror,
}

/// Order in which [`SyncTree::traverse`] yields nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Parents before their children.
    #[default]
    PreOrder,
    /// Children before their parents.
    PostOrder,
}

/// Summary statistics for a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Number of documents.
    pub documents: u64,
    /// Number of directories (excluding the root).
    pub directories: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a node.
    pub fn record(&mut self, kind: NodeKind, depth: usize) {
        match kind {
            NodeKind::Directory => self.directories += 1,
            NodeKind::Document => self.documents += 1,
        }
        self.max_depth = self.max_depth.max(depth as u32);
    }
}

/// A device or mirror tree stored as an append-only arena.
///
/// Node 0 is always the root. Nodes are never removed, so a [`NodeId`]
/// stays valid for the lifetime of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTree {
    side: Side,
    root_path: Option<PathBuf>,
    nodes: Vec<SyncNode>,
    stats: TreeStats,
}

impl SyncTree {
    /// Create a tree holding only a root node.
    pub fn new(side: Side) -> Self {
        let root = SyncNode {
            id: NodeId::ROOT,
            locator: Locator::Root,
            name: CompactString::default(),
            kind: NodeKind::Directory,
            timestamps: Timestamps::default(),
            parent: None,
            children: Vec::new(),
            path: CompactString::default(),
        };

        Self {
            side,
            root_path: None,
            nodes: vec![root],
            stats: TreeStats::new(),
        }
    }

    /// Create a mirror tree rooted at a filesystem directory.
    pub fn with_root_path(side: Side, root_path: impl Into<PathBuf>, timestamps: Timestamps) -> Self {
        let mut tree = Self::new(side);
        let root_path = root_path.into();
        tree.nodes[0].locator = Locator::Mirror(root_path.clone());
        tree.nodes[0].timestamps = timestamps;
        tree.root_path = Some(root_path);
        tree
    }

    /// Which side this tree describes.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Filesystem directory this tree mirrors, if any.
    pub fn root_path(&self) -> Option<&PathBuf> {
        self.root_path.as_ref()
    }

    /// The root node.
    pub fn root(&self) -> &SyncNode {
        &self.nodes[0]
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&SyncNode> {
        self.nodes.get(id.index())
    }

    /// Get a node by id, panicking on a foreign id.
    pub fn node(&self, id: NodeId) -> &SyncNode {
        &self.nodes[id.index()]
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Summary statistics.
    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    /// Children of a node.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &SyncNode> + '_ {
        self.node(id).children.iter().map(move |child| self.node(*child))
    }

    /// Parent of a node (None for the root).
    pub fn parent(&self, id: NodeId) -> Option<&SyncNode> {
        self.node(id).parent.map(|parent| self.node(parent))
    }

    /// Append a child below `parent` and return its id.
    ///
    /// `path_name` is the last path component; it differs from `name` when a
    /// rendering extension is appended to a device document.
    pub fn insert(
        &mut self,
        parent: NodeId,
        locator: Locator,
        name: impl Into<CompactString>,
        path_name: &str,
        kind: NodeKind,
        timestamps: Timestamps,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let path = join_path(&self.node(parent).path, path_name);

        self.stats.record(kind, crate::node::path_depth(&path));
        self.nodes.push(SyncNode {
            id,
            locator,
            name: name.into(),
            kind,
            timestamps,
            parent: Some(parent),
            children: Vec::new(),
            path,
        });
        self.nodes[parent.index()].children.push(id);

        id
    }

    /// Lazily walk the subtree below `start`, depth-first.
    ///
    /// `start` itself is not yielded. Hidden nodes are skipped together with
    /// their subtrees.
    pub fn traverse(&self, start: NodeId, order: TraversalOrder) -> Traverse<'_> {
        let mut traverse = Traverse {
            tree: self,
            order,
            stack: Vec::new(),
        };
        traverse.push_children(start);
        traverse
    }

    /// Pre-order traversal of the whole tree.
    pub fn iter(&self) -> Traverse<'_> {
        self.traverse(NodeId::ROOT, TraversalOrder::PreOrder)
    }
}

/// Lazy depth-first iterator returned by [`SyncTree::traverse`].
#[derive(Debug)]
pub struct Traverse<'a> {
    tree: &'a SyncTree,
    order: TraversalOrder,
    /// Pending nodes; the flag marks nodes whose children were already pushed.
    stack: Vec<(NodeId, bool)>,
}

impl Traverse<'_> {
    fn push_children(&mut self, id: NodeId) {
        for child in self.tree.node(id).children.iter().rev() {
            if !self.tree.node(*child).is_hidden() {
                self.stack.push((*child, false));
            }
        }
    }
}

impl<'a> Iterator for Traverse<'a> {
    type Item = &'a SyncNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, expanded) = self.stack.pop()?;
            match self.order {
                TraversalOrder::PreOrder => {
                    self.push_children(id);
                    return Some(self.tree.node(id));
                }
                TraversalOrder::PostOrder if expanded => {
                    return Some(self.tree.node(id));
                }
                TraversalOrder::PostOrder => {
                    self.stack.push((id, true));
                    self.push_children(id);
                }
            }
        }
    }
}
