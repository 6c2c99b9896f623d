//! Device tree reconstruction from flat metadata records.

use std::collections::{HashMap, VecDeque};

use compact_str::CompactString;
use tracing::{debug, warn};

use rmsync_core::{
    join_path, ItemId, ItemRecord, Locator, NodeId, NodeKind, Side, SyncConfig, SyncError,
    SyncTree,
};

use crate::store::MetadataStore;

/// Builds the identifier-addressed device tree.
///
/// Records only know their parent, so the builder first inverts the parent
/// links into an adjacency list and then walks it breadth-first from the
/// root. Anything not reachable from the root (the trash container and its
/// contents, orphans with a dangling parent) never enters the tree.
#[derive(Debug, Clone)]
pub struct DeviceTreeBuilder<'a> {
    config: &'a SyncConfig,
}

impl<'a> DeviceTreeBuilder<'a> {
    /// Create a builder using a config's naming rules.
    pub fn new(config: &'a SyncConfig) -> Self {
        Self { config }
    }

    /// Build the tree from every record in the store.
    pub fn build(&self, store: &MetadataStore) -> Result<SyncTree, SyncError> {
        let children = self.adjacency(store);
        let mut tree = SyncTree::new(Side::Device);
        let mut seen_paths: HashMap<CompactString, (NodeKind, ItemId)> = HashMap::new();
        let mut queue = VecDeque::from([(ItemId::new(ItemId::ROOT), NodeId::ROOT)]);

        while let Some((parent_id, parent_node)) = queue.pop_front() {
            let Some(child_ids) = children.get(&parent_id) else {
                continue;
            };

            for (child_id, record) in child_ids {
                if record.is_trashed() {
                    debug!(id = %child_id, "skipping trashed item");
                    continue;
                }

                // Only items that reach the tree must be exactly one kind.
                let kind = record.kind(child_id)?;
                let path_name = self
                    .config
                    .mirror_name(&record.visible_name, kind.is_document());
                let path = join_path(&tree.node(parent_node).path, &path_name);
                match seen_paths.get(&path) {
                    Some((seen_kind, _)) if *seen_kind != kind => {
                        return Err(SyncError::KindConflict {
                            path,
                            first: *seen_kind,
                            second: kind,
                        });
                    }
                    Some((_, seen_id)) => {
                        warn!(%path, first = %seen_id, duplicate = %child_id, "duplicate device path, first item wins");
                        continue;
                    }
                    None => {
                        seen_paths.insert(path, (kind, (*child_id).clone()));
                    }
                }

                let node = tree.insert(
                    parent_node,
                    Locator::Device((*child_id).clone()),
                    record.visible_name.as_str(),
                    &path_name,
                    kind,
                    record.timestamps(),
                );

                if kind.is_dir() {
                    queue.push_back(((*child_id).clone(), node));
                }
            }
        }

        let stats = tree.stats();
        debug!(
            documents = stats.documents,
            directories = stats.directories,
            "built device tree"
        );
        Ok(tree)
    }

    /// Invert parent links into sorted child lists.
    fn adjacency<'s>(
        &self,
        store: &'s MetadataStore,
    ) -> HashMap<ItemId, Vec<(&'s ItemId, &'s ItemRecord)>> {
        let mut children: HashMap<ItemId, Vec<(&ItemId, &ItemRecord)>> = HashMap::new();

        for (id, record) in store.iter() {
            let parent = record.parent_id();
            if !parent.is_root() && !parent.is_trash() && !store.contains(&parent) {
                warn!(%id, %parent, name = %record.visible_name, "dropping item with unknown parent");
                continue;
            }
            children.entry(parent).or_default().push((id, record));
        }

        for list in children.values_mut() {
            list.sort_by(|(a_id, a), (b_id, b)| {
                a.visible_name
                    .cmp(&b.visible_name)
                    .then_with(|| a_id.cmp(b_id))
            });
        }

        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, parent: &str, kind: &str, modified_ms: i64) -> ItemRecord {
        ItemRecord::from_json(
            &ItemId::new("t"),
            &format!(
                r#"{{"visibleName": "{name}", "parent": "{parent}", "type": "{kind}", "lastModified": "{modified_ms}"}}"#
            ),
        )
        .unwrap()
    }

    fn build(records: Vec<(&str, ItemRecord)>) -> Result<SyncTree, SyncError> {
        let store: MetadataStore = records
            .into_iter()
            .map(|(id, r)| (ItemId::new(id), r))
            .collect();
        let config = SyncConfig::new("/mirror");
        DeviceTreeBuilder::new(&config).build(&store)
    }

    fn paths(tree: &SyncTree) -> Vec<String> {
        tree.iter().map(|n| n.path.to_string()).collect()
    }

    #[test]
    fn test_builds_nested_paths_with_extensions() {
        let tree = build(vec![
            ("n", record("Notes", "", "CollectionType", 0)),
            ("a", record("a", "n", "CollectionType", 0)),
            ("b", record("b", "a", "DocumentType", 100_000)),
            ("p", record("paper.pdf", "", "DocumentType", 5_000)),
        ])
        .unwrap();

        assert_eq!(paths(&tree), vec!["Notes", "Notes/a", "Notes/a/b.pdf", "paper.pdf"]);
        let b = tree.iter().find(|n| n.name == "b").unwrap();
        assert_eq!(b.timestamps.modified, 100);
        assert_eq!(b.locator, Locator::Device(ItemId::new("b")));
    }

    #[test]
    fn test_trash_and_descendants_are_excluded() {
        let tree = build(vec![
            ("t", record("Old", "trash", "CollectionType", 0)),
            ("c", record("child", "t", "DocumentType", 0)),
            ("k", record("Keep", "", "DocumentType", 0)),
        ])
        .unwrap();

        assert_eq!(paths(&tree), vec!["Keep.pdf"]);
    }

    #[test]
    fn test_invalid_type_in_trash_is_ignored() {
        let tree = build(vec![
            ("t", record("Template", "trash", "TemplateType", 0)),
            ("n", record("Notes", "", "CollectionType", 0)),
        ])
        .unwrap();

        assert_eq!(paths(&tree), vec!["Notes"]);
    }

    #[test]
    fn test_deleted_flag_excludes_subtree() {
        let mut dir = record("Gone", "", "CollectionType", 0);
        dir.deleted = true;
        let tree = build(vec![
            ("g", dir),
            ("c", record("child", "g", "DocumentType", 0)),
        ])
        .unwrap();

        assert!(tree.is_empty());
    }

    #[test]
    fn test_dangling_parent_is_dropped() {
        let tree = build(vec![
            ("o", record("Orphan", "missing", "DocumentType", 0)),
            ("k", record("Keep", "", "CollectionType", 0)),
        ])
        .unwrap();

        assert_eq!(paths(&tree), vec!["Keep"]);
    }

    #[test]
    fn test_invalid_type_is_fatal() {
        let err = build(vec![("x", record("X", "", "TemplateType", 0))]).unwrap_err();
        assert!(matches!(err, SyncError::NotExclusiveKind { .. }));
    }

    #[test]
    fn test_conflicting_kinds_at_same_path_is_fatal() {
        let err = build(vec![
            ("d", record("x.pdf", "", "CollectionType", 0)),
            ("f", record("x", "", "DocumentType", 0)),
        ])
        .unwrap_err();
        assert!(matches!(err, SyncError::KindConflict { .. }));
    }

    #[test]
    fn test_duplicate_path_keeps_first_item() {
        let tree = build(vec![
            ("2", record("Same", "", "DocumentType", 0)),
            ("1", record("Same", "", "DocumentType", 0)),
        ])
        .unwrap();

        assert_eq!(paths(&tree), vec!["Same.pdf"]);
        let node = tree.iter().next().unwrap();
        assert_eq!(node.locator, Locator::Device(ItemId::new("1")));
    }
}
