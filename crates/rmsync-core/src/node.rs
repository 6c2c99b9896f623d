//! Tree node types shared by the device and mirror trees.

use std::fmt;
use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Index of a node within a [`SyncTree`](crate::SyncTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a new NodeId from an arena index.
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Arena index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable, opaque identifier of an item on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub CompactString);

impl ItemId {
    /// Parent identifier of top-level items.
    pub const ROOT: &'static str = "";
    /// Parent identifier of trashed items.
    pub const TRASH: &'static str = "trash";

    /// Create an identifier from a string.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the identifier of the device root.
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Check if this is the identifier of the trash container.
    pub fn is_trash(&self) -> bool {
        self.0 == Self::TRASH
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Item timestamps in whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last modification time.
    pub modified: i64,
    /// Last access (device: last opened) time.
    pub accessed: i64,
    /// Creation time (mirror only; platform-dependent).
    pub created: Option<i64>,
}

impl Timestamps {
    /// Create timestamps with only a modification time.
    pub fn with_modified(modified: i64) -> Self {
        Self {
            modified,
            accessed: 0,
            created: None,
        }
    }

    /// Create timestamps with all available times.
    pub fn new(modified: i64, accessed: i64, created: Option<i64>) -> Self {
        Self {
            modified,
            accessed,
            created,
        }
    }
}

/// Kind of synchronized item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum NodeKind {
    /// A folder (device "CollectionType").
    #[strum(serialize = "directory")]
    Directory,
    /// A notebook, PDF or EPUB (device "DocumentType").
    #[strum(serialize = "document")]
    Document,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Check if this is a document.
    pub fn is_document(self) -> bool {
        matches!(self, NodeKind::Document)
    }
}

/// Where a node lives: the tree root, a device record or a mirror path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// The (synthetic) root of either tree.
    Root,
    /// An item in the device's flat store.
    Device(ItemId),
    /// An entry on the local filesystem (absolute path).
    Mirror(PathBuf),
}

impl Locator {
    /// The device identifier, if this is a device item.
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Locator::Device(id) => Some(id),
            _ => None,
        }
    }

    /// The filesystem path, if this is a mirror entry.
    pub fn mirror_path(&self) -> Option<&PathBuf> {
        match self {
            Locator::Mirror(path) => Some(path),
            _ => None,
        }
    }
}

/// A single directory or document in a [`SyncTree`](crate::SyncTree).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncNode {
    /// Arena index of this node.
    pub id: NodeId,

    /// Device identifier or filesystem location.
    pub locator: Locator,

    /// Display name (device) or file name (mirror).
    pub name: CompactString,

    /// Directory or document.
    pub kind: NodeKind,

    /// Item timestamps.
    pub timestamps: Timestamps,

    /// Parent node (None for the root).
    pub parent: Option<NodeId>,

    /// Children in insertion order.
    pub children: Vec<NodeId>,

    /// Slash-separated path relative to the root, computed once on insertion.
    pub path: CompactString,
}

impl SyncNode {
    /// Check if this node is the tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a document.
    pub fn is_document(&self) -> bool {
        self.kind.is_document()
    }

    /// Check if the name marks a hidden entry.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Number of path components below the root.
    pub fn depth(&self) -> usize {
        path_depth(&self.path)
    }

    /// Extension of the node name, without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.name)
    }
}

/// Number of components in a relative, slash-separated path.
pub fn path_depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Extension of a file name, without the leading dot.
///
/// A leading dot (hidden file) does not start an extension.
pub fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&name[pos + 1..]),
    }
}

/// Join a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> CompactString {
    if parent.is_empty() {
        CompactString::from(name)
    } else {
        let mut path = CompactString::with_capacity(parent.len() + 1 + name.len());
        path.push_str(parent);
        path.push('/');
        path.push_str(name);
        path
    }
}
