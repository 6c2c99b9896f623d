use rmsync_core::{
    Action, ItemId, ItemRecord, Locator, NodeId, NodeKind, Reason, Side, SyncConfig, SyncError,
    SyncTree, Timestamps,
};
use rmsync_plan::{Plan, PlanConfig, SyncPlanner};
use rmsync_scan::{Correspondence, DeviceTreeBuilder, MetadataStore, MirrorScanner};
use std::fs;
use tempfile::TempDir;

fn record(name: &str, parent: &str, kind: NodeKind, modified: i64) -> ItemRecord {
    ItemRecord::new(
        name,
        &ItemId::new(parent),
        kind,
        Timestamps::new(modified, modified, None),
    )
}

fn device_tree(records: Vec<(&str, ItemRecord)>) -> SyncTree {
    let store: MetadataStore = records
        .into_iter()
        .map(|(id, record)| (ItemId::new(id), record))
        .collect();
    let config = SyncConfig::new("/tmp/mirror");
    DeviceTreeBuilder::new(&config).build(&store).unwrap()
}

/// Mirror tree built in memory so creation times can be chosen freely.
struct MirrorBuilder {
    tree: SyncTree,
}

impl MirrorBuilder {
    fn new() -> Self {
        Self {
            tree: SyncTree::with_root_path(Side::Mirror, "/m", Timestamps::default()),
        }
    }

    fn add(&mut self, parent: NodeId, name: &str, kind: NodeKind, modified: i64, created: i64) -> NodeId {
        let path = self.tree.node(parent).path.clone();
        let full = if path.is_empty() {
            format!("/m/{name}")
        } else {
            format!("/m/{path}/{name}")
        };
        self.tree.insert(
            parent,
            Locator::Mirror(full.into()),
            name,
            name,
            kind,
            Timestamps::new(modified, modified, Some(created)),
        )
    }
}

fn plan(device: &SyncTree, mirror: &SyncTree, watermark: Option<i64>) -> Plan {
    SyncPlanner::new()
        .plan(device, mirror, &Correspondence::new(), watermark)
        .unwrap()
}

fn describe(plan: &Plan) -> Vec<String> {
    plan.iter()
        .map(|op| format!("{} {}", op.action, op.path))
        .collect()
}

#[test]
fn test_empty_mirror_pulls_parents_first() {
    let device = device_tree(vec![
        ("n", record("Notes", "", NodeKind::Directory, 0)),
        ("a", record("a", "n", NodeKind::Directory, 0)),
        ("b", record("b", "a", NodeKind::Document, 100)),
    ]);
    let mirror = MirrorBuilder::new().tree;

    let plan = plan(&device, &mirror, None);
    assert_eq!(
        describe(&plan),
        vec!["PULL Notes", "PULL Notes/a", "PULL Notes/a/b.pdf"]
    );
    assert!(plan.iter().all(|op| op.reason == Reason::OnlyOnDevice));
    assert!(plan.iter().all(|op| op.device.is_some() && op.mirror.is_none()));
}

#[test]
fn test_device_only_items_get_exactly_one_pull() {
    let device = device_tree(vec![
        ("d", record("Docs", "", NodeKind::Directory, 0)),
        ("x", record("x.pdf", "d", NodeKind::Document, 10)),
        ("y", record("y", "d", NodeKind::Document, 20)),
    ]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "Docs", NodeKind::Directory, 5, 5);

    let plan = plan(&device, &mirror.tree, Some(1_000));
    assert_eq!(describe(&plan), vec!["PULL Docs/x.pdf", "PULL Docs/y.pdf"]);
    assert_eq!(plan.skipped, 1);
}

#[test]
fn test_mirror_only_file_against_watermark() {
    let device = device_tree(vec![]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "x.pdf", NodeKind::Document, 10, 50);

    let pushed = plan(&device, &mirror.tree, Some(30));
    assert_eq!(describe(&pushed), vec!["PUSH x.pdf"]);
    assert_eq!(pushed.operations[0].reason, Reason::AddedOnMirror);

    let dropped = plan(&device, &mirror.tree, Some(60));
    assert_eq!(describe(&dropped), vec!["DROP x.pdf"]);
    assert_eq!(dropped.operations[0].reason, Reason::DeletedOnDevice);
}

#[test]
fn test_document_pairs_compare_modification_times() {
    let device = device_tree(vec![
        ("a", record("a", "", NodeKind::Document, 200)),
        ("b", record("b", "", NodeKind::Document, 100)),
        ("c", record("c", "", NodeKind::Document, 100)),
    ]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "a.pdf", NodeKind::Document, 100, 100);
    mirror.add(NodeId::ROOT, "b.pdf", NodeKind::Document, 200, 100);
    mirror.add(NodeId::ROOT, "c.pdf", NodeKind::Document, 100, 100);

    let plan = plan(&device, &mirror.tree, Some(0));
    assert_eq!(describe(&plan), vec!["PULL a.pdf", "PUSH b.pdf"]);
    assert_eq!(plan.skipped, 1);
    assert_eq!(plan.operations[0].reason, Reason::NewerOnDevice);
    assert_eq!(plan.operations[1].reason, Reason::NewerOnMirror);
    assert!(plan.operations[1].device.is_some());
}

#[test]
fn test_directories_are_skipped_regardless_of_times() {
    let device = device_tree(vec![("n", record("Notes", "", NodeKind::Directory, 999))]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "Notes", NodeKind::Directory, 1, 1);

    let plan = plan(&device, &mirror.tree, None);
    assert!(plan.is_empty());
    assert_eq!(plan.skipped, 1);
}

#[test]
fn test_drops_remove_children_before_parents() {
    let device = device_tree(vec![]);
    let mut mirror = MirrorBuilder::new();
    let old = mirror.add(NodeId::ROOT, "Old", NodeKind::Directory, 10, 10);
    let inner = mirror.add(old, "Inner", NodeKind::Directory, 10, 10);
    mirror.add(inner, "deep.pdf", NodeKind::Document, 10, 10);
    mirror.add(old, "a.pdf", NodeKind::Document, 10, 10);

    let plan = plan(&device, &mirror.tree, Some(100));
    assert_eq!(
        describe(&plan),
        vec![
            "DROP Old/Inner/deep.pdf",
            "DROP Old/a.pdf",
            "DROP Old/Inner",
            "DROP Old",
        ]
    );
}

#[test]
fn test_ancestor_ordering_across_categories() {
    let device = device_tree(vec![
        ("z", record("Zeta", "", NodeKind::Directory, 0)),
        ("zz", record("deep", "z", NodeKind::Document, 10)),
    ]);
    let mut mirror = MirrorBuilder::new();
    let new = mirror.add(NodeId::ROOT, "New", NodeKind::Directory, 500, 500);
    mirror.add(new, "n.pdf", NodeKind::Document, 500, 500);
    let gone = mirror.add(NodeId::ROOT, "Gone", NodeKind::Directory, 10, 10);
    mirror.add(gone, "g.pdf", NodeKind::Document, 10, 10);

    let plan = plan(&device, &mirror.tree, Some(100));
    assert_eq!(
        describe(&plan),
        vec![
            "PULL Zeta",
            "PULL Zeta/deep.pdf",
            "PUSH New",
            "PUSH New/n.pdf",
            "DROP Gone/g.pdf",
            "DROP Gone",
        ]
    );

    // Ancestors precede descendants for creations, follow them for removals.
    for (i, a) in plan.operations.iter().enumerate() {
        for (j, b) in plan.operations.iter().enumerate() {
            let ancestor = b.path.starts_with(&format!("{}/", a.path));
            if ancestor && a.action == b.action {
                match a.action {
                    Action::Drop => assert!(j < i, "{b} should precede {a}"),
                    _ => assert!(i < j, "{a} should precede {b}"),
                }
            }
        }
    }
}

#[test]
fn test_planning_is_idempotent() {
    let device = device_tree(vec![
        ("b", record("B", "", NodeKind::Directory, 0)),
        ("a", record("A", "", NodeKind::Directory, 0)),
        ("a1", record("one", "a", NodeKind::Document, 10)),
        ("b1", record("two", "b", NodeKind::Document, 10)),
    ]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "c.pdf", NodeKind::Document, 10, 10);
    mirror.add(NodeId::ROOT, "d.epub", NodeKind::Document, 500, 500);

    let resolver = Correspondence::new();
    let planner = SyncPlanner::new();
    let first = planner.plan(&device, &mirror.tree, &resolver, Some(100)).unwrap();
    let second = planner.plan(&device, &mirror.tree, &resolver, Some(100)).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        describe(&first),
        vec![
            "PULL A",
            "PULL B",
            "PULL A/one.pdf",
            "PULL B/two.pdf",
            "PUSH d.epub",
            "DROP c.pdf",
        ]
    );
}

#[test]
fn test_kind_conflict_aborts_planning() {
    let device = device_tree(vec![("x", record("x.pdf", "", NodeKind::Directory, 0))]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "x.pdf", NodeKind::Document, 10, 10);

    let err = SyncPlanner::new()
        .plan(&device, &mirror.tree, &Correspondence::new(), None)
        .unwrap_err();
    assert!(matches!(err, SyncError::KindConflict { .. }));
    assert!(err.is_consistency());
}

#[test]
fn test_unpushable_files_are_reported_not_planned() {
    let device = device_tree(vec![]);
    let mut mirror = MirrorBuilder::new();
    mirror.add(NodeId::ROOT, "notes.txt", NodeKind::Document, 500, 500);
    mirror.add(NodeId::ROOT, "stale.txt", NodeKind::Document, 10, 10);

    let plan = plan(&device, &mirror.tree, Some(100));
    assert_eq!(describe(&plan), vec!["DROP stale.txt"]);
    assert_eq!(plan.unpushable, vec!["notes.txt"]);

    let permissive = PlanConfig::builder()
        .pushable_extensions(vec!["txt".to_string()])
        .build()
        .unwrap();
    let plan = SyncPlanner::with_config(permissive)
        .plan(&device, &mirror.tree, &Correspondence::new(), Some(100))
        .unwrap();
    assert_eq!(describe(&plan), vec!["PUSH notes.txt", "DROP stale.txt"]);
}

#[test]
fn test_plan_against_scanned_mirror() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("Notes")).unwrap();
    fs::write(temp.path().join("Notes/a.pdf"), b"%PDF").unwrap();
    fs::write(temp.path().join(".last_sync"), b"0\n").unwrap();
    filetime::set_file_mtime(
        temp.path().join("Notes/a.pdf"),
        filetime::FileTime::from_unix_time(100, 0),
    )
    .unwrap();

    let device = device_tree(vec![
        ("n", record("Notes", "", NodeKind::Directory, 0)),
        ("a", record("a", "n", NodeKind::Document, 100)),
    ]);
    let mirror = MirrorScanner::new().scan(temp.path()).unwrap();

    let plan = plan(&device, &mirror, None);
    assert!(plan.is_empty(), "unexpected plan: {:?}", describe(&plan));
    assert_eq!(plan.skipped, 2);
}

#[test]
fn test_contents_of_new_directory_are_pushed() {
    let device = device_tree(vec![]);
    let mut mirror = MirrorBuilder::new();
    let inbox = mirror.add(NodeId::ROOT, "Inbox", NodeKind::Directory, 10, 200);
    let old = mirror.add(inbox, "Old", NodeKind::Directory, 10, 10);
    mirror.add(old, "paper.pdf", NodeKind::Document, 10, 10);
    mirror.add(NodeId::ROOT, "stale.pdf", NodeKind::Document, 10, 10);

    let plan = plan(&device, &mirror.tree, Some(100));
    assert_eq!(
        describe(&plan),
        vec![
            "PUSH Inbox",
            "PUSH Inbox/Old",
            "PUSH Inbox/Old/paper.pdf",
            "DROP stale.pdf"
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_files_moved_into_mirror_are_pushed() {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    let temp = TempDir::new().unwrap();
    let mirror_root = temp.path().join("remarkable");
    let downloads = temp.path().join("downloads");
    fs::create_dir(&mirror_root).unwrap();
    fs::create_dir_all(downloads.join("Papers")).unwrap();
    fs::write(downloads.join("paper.pdf"), b"%PDF").unwrap();
    fs::write(downloads.join("Papers/other.pdf"), b"%PDF").unwrap();
    for path in ["paper.pdf", "Papers/other.pdf", "Papers"] {
        filetime::set_file_mtime(downloads.join(path), filetime::FileTime::from_unix_time(1_000, 0))
            .unwrap();
    }

    let watermark = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    std::thread::sleep(Duration::from_millis(1_100));
    fs::rename(downloads.join("paper.pdf"), mirror_root.join("paper.pdf")).unwrap();
    fs::rename(downloads.join("Papers"), mirror_root.join("Papers")).unwrap();

    let device = device_tree(vec![]);
    let mirror = MirrorScanner::new().scan(&mirror_root).unwrap();
    let plan = plan(&device, &mirror, Some(watermark));

    assert_eq!(
        describe(&plan),
        vec!["PUSH Papers", "PUSH paper.pdf", "PUSH Papers/other.pdf"]
    );
    assert!(plan.iter().all(|op| op.reason == Reason::AddedOnMirror));
}
