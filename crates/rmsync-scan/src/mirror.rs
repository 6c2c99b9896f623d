//! JWalk-based scanner for the local mirror directory.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use rmsync_core::{Locator, NodeId, NodeKind, Side, SyncError, SyncTree, Timestamps};

/// Scans the mirror directory into a path-addressed tree.
///
/// The walk is serial and sorted so that two scans of the same directory
/// produce identical trees. Hidden entries are skipped, which keeps the
/// watermark file out of the tree.
#[derive(Debug, Clone, Default)]
pub struct MirrorScanner {
    include_hidden: bool,
}

impl MirrorScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include entries whose name starts with a dot.
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Scan the directory at `root`.
    pub fn scan(&self, root: &Path) -> Result<SyncTree, SyncError> {
        let root_path = root.canonicalize().map_err(|e| SyncError::io(root, e))?;
        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| SyncError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(SyncError::InvalidConfig {
                message: format!("Mirror root is not a directory: {}", root_path.display()),
            });
        }

        let mut entries_by_parent = self.collect_entries(&root_path)?;
        let mut tree =
            SyncTree::with_root_path(Side::Mirror, &root_path, timestamps_of(&root_metadata));
        Self::build_node(&mut tree, NodeId::ROOT, &root_path, &mut entries_by_parent);

        let stats = tree.stats();
        debug!(
            root = %root_path.display(),
            documents = stats.documents,
            directories = stats.directories,
            "scanned mirror"
        );
        Ok(tree)
    }

    /// Collect all entries using jwalk, grouped by parent directory.
    fn collect_entries(&self, root_path: &Path) -> Result<HashMap<PathBuf, Vec<EntryInfo>>, SyncError> {
        let walker = WalkDir::new(root_path)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(!self.include_hidden)
            .follow_links(false)
            .min_depth(1);

        let mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>> = HashMap::new();

        for entry_result in walker {
            let entry = entry_result.map_err(|err| {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root_path.to_path_buf());
                SyncError::Other {
                    message: format!("Failed to read {}: {err}", path.display()),
                }
            })?;

            let path = entry.path();
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                NodeKind::Directory
            } else if file_type.is_file() {
                NodeKind::Document
            } else {
                warn!(path = %path.display(), "skipping entry that is neither a file nor a directory");
                continue;
            };

            let metadata = entry.metadata().map_err(|err| SyncError::Other {
                message: format!("Failed to read metadata of {}: {err}", path.display()),
            })?;

            if let Some(parent) = path.parent() {
                entries_by_parent
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(EntryInfo {
                        name: entry.file_name().to_string_lossy().into(),
                        path: path.clone(),
                        kind,
                        timestamps: timestamps_of(&metadata),
                    });
            }
        }

        Ok(entries_by_parent)
    }

    /// Recursively insert the children of `path` below `node`.
    fn build_node(
        tree: &mut SyncTree,
        node: NodeId,
        path: &Path,
        entries_by_parent: &mut HashMap<PathBuf, Vec<EntryInfo>>,
    ) {
        let children = entries_by_parent.remove(path).unwrap_or_default();

        for entry in children {
            let name = entry.name.clone();
            let child = tree.insert(
                node,
                Locator::Mirror(entry.path.clone()),
                entry.name,
                &name,
                entry.kind,
                entry.timestamps,
            );
            if entry.kind.is_dir() {
                Self::build_node(tree, child, &entry.path, entries_by_parent);
            }
        }
    }
}

/// Temporary struct for collecting entry information.
struct EntryInfo {
    name: CompactString,
    path: PathBuf,
    kind: NodeKind,
    timestamps: Timestamps,
}

/// Read modification, access and creation times in seconds.
pub fn timestamps_of(metadata: &Metadata) -> Timestamps {
    Timestamps::new(
        metadata.modified().map(secs).unwrap_or(0),
        metadata.accessed().map(secs).unwrap_or(0),
        created(metadata),
    )
}

fn secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

// Cross-platform creation time

/// Inode change time, the moment the entry last appeared at its path.
///
/// Birth time survives a rename, so a file moved into the mirror would look
/// older than the last sync. The change time is updated by the move.
#[cfg(unix)]
fn created(metadata: &Metadata) -> Option<i64> {
    Some(metadata.ctime())
}

#[cfg(not(unix))]
fn created(metadata: &Metadata) -> Option<i64> {
    metadata.created().map(secs).ok()
}
