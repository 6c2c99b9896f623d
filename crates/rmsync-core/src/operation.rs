//! Planned synchronization operations.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::node::{path_depth, NodeId};

/// What to do with one path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Action {
    /// Materialize the device item on the mirror.
    Pull,
    /// Upload the mirror item to the device.
    Push,
    /// Remove the mirror item.
    Drop,
}

impl Action {
    /// Verb used in error messages.
    pub fn verb(self) -> &'static str {
        match self {
            Action::Pull => "pull",
            Action::Push => "push",
            Action::Drop => "drop",
        }
    }
}

/// Why an action was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Reason {
    #[strum(serialize = "only on device")]
    OnlyOnDevice,
    #[strum(serialize = "newer on device")]
    NewerOnDevice,
    #[strum(serialize = "newer on mirror")]
    NewerOnMirror,
    #[strum(serialize = "added on mirror")]
    AddedOnMirror,
    #[strum(serialize = "deleted on device")]
    DeletedOnDevice,
}

/// One planned operation on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The action to perform.
    pub action: Action,
    /// Why it was chosen.
    pub reason: Reason,
    /// Path relative to both roots.
    pub path: CompactString,
    /// Device tree node, if the item exists on the device.
    pub device: Option<NodeId>,
    /// Mirror tree node, if the item exists on the mirror.
    pub mirror: Option<NodeId>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(
        action: Action,
        reason: Reason,
        path: impl Into<CompactString>,
        device: Option<NodeId>,
        mirror: Option<NodeId>,
    ) -> Self {
        Self {
            action,
            reason,
            path: path.into(),
            device,
            mirror,
        }
    }

    /// Number of path components.
    pub fn depth(&self) -> usize {
        path_depth(&self.path)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.action, self.path, self.reason)
    }
}
