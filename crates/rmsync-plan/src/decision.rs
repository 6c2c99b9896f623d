//! Per-pair sync decisions.
//!
//! | Device   | Mirror   | Decision                                   |
//! |----------|----------|--------------------------------------------|
//! | present  | absent   | PULL                                       |
//! | dir      | dir      | SKIP                                       |
//! | document | document | newer side wins, SKIP when equal           |
//! | absent   | present  | PUSH or DROP, depending on the watermark   |

use rmsync_core::{Action, Reason, SyncNode};

/// A device node, a mirror node, or both. Never neither.
#[derive(Debug, Clone, Copy)]
pub enum Pair<'a> {
    /// Exists only in the device tree.
    DeviceOnly(&'a SyncNode),
    /// Exists only in the mirror tree.
    MirrorOnly(&'a SyncNode),
    /// Exists at the same path on both sides.
    Both {
        device: &'a SyncNode,
        mirror: &'a SyncNode,
    },
}

impl<'a> Pair<'a> {
    /// The device side, if present.
    pub fn device(&self) -> Option<&'a SyncNode> {
        match *self {
            Pair::DeviceOnly(device) | Pair::Both { device, .. } => Some(device),
            Pair::MirrorOnly(_) => None,
        }
    }

    /// The mirror side, if present.
    pub fn mirror(&self) -> Option<&'a SyncNode> {
        match *self {
            Pair::MirrorOnly(mirror) | Pair::Both { mirror, .. } => Some(mirror),
            Pair::DeviceOnly(_) => None,
        }
    }

    /// The shared relative path.
    pub fn path(&self) -> &'a str {
        match *self {
            Pair::DeviceOnly(node) | Pair::MirrorOnly(node) => &node.path,
            Pair::Both { device, .. } => &device.path,
        }
    }
}

/// Outcome of comparing one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Perform an action.
    Act(Action, Reason),
    /// Both sides already agree.
    Skip,
}

/// Decide what to do with a pair.
///
/// `watermark` is the time of the last successful sync; `None` means the
/// mirror has never been synced, so every mirror-only item is new.
pub fn decide(pair: Pair<'_>, watermark: Option<i64>) -> Decision {
    match pair {
        Pair::DeviceOnly(_) => Decision::Act(Action::Pull, Reason::OnlyOnDevice),
        Pair::Both { device, mirror } => {
            // A directory's name is all there is to compare.
            if device.is_dir() || mirror.is_dir() {
                return Decision::Skip;
            }
            let (remote, local) = (device.timestamps.modified, mirror.timestamps.modified);
            if remote > local {
                Decision::Act(Action::Pull, Reason::NewerOnDevice)
            } else if remote < local {
                Decision::Act(Action::Push, Reason::NewerOnMirror)
            } else {
                Decision::Skip
            }
        }
        Pair::MirrorOnly(mirror) => {
            let created_after_sync = match watermark {
                None => true,
                Some(watermark) => watermark < reference_time(mirror),
            };
            if created_after_sync {
                Decision::Act(Action::Push, Reason::AddedOnMirror)
            } else {
                Decision::Act(Action::Drop, Reason::DeletedOnDevice)
            }
        }
    }
}

/// Time that tells "created on the mirror" apart from "deleted on the device".
///
/// Directories change their modification time whenever their contents
/// change, so their creation time is used. Files copied onto the mirror
/// often keep an old modification time, in which case their (later) creation
/// time is used too.
pub fn reference_time(mirror: &SyncNode) -> i64 {
    let times = mirror.timestamps;
    match times.created {
        Some(created) if mirror.is_dir() || created > times.modified => created,
        _ => times.modified,
    }
}
