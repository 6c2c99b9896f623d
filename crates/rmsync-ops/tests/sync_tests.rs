use filetime::FileTime;
use rmsync_core::{
    Action, ItemId, ItemRecord, NodeKind, SyncConfig, SyncError, Timestamps, Transport, Watermark,
};
use rmsync_ops::{DirectoryTransport, Renderer, SyncEvent, SyncSession};
use rmsync_plan::SyncPlanner;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stands in for a real renderer: the "rendering" is the raw file itself.
struct CopyRenderer;

impl Renderer for CopyRenderer {
    fn name(&self) -> &str {
        "copy"
    }

    fn render(&self, input: &Path, output: &Path) -> Result<(), SyncError> {
        fs::copy(input, output).map(drop).map_err(|e| SyncError::Render {
            path: output.display().to_string().into(),
            message: e.to_string(),
        })
    }
}

struct Setup {
    _temp: TempDir,
    raw: PathBuf,
    config: SyncConfig,
}

impl Setup {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let raw = temp.path().join("xochitl");
        fs::create_dir(&raw).unwrap();
        let config = SyncConfig::new(temp.path().join("remarkable"));
        Self {
            _temp: temp,
            raw,
            config,
        }
    }

    fn add(&self, id: &str, name: &str, parent: &str, kind: NodeKind, modified: i64) {
        let record = ItemRecord::new(
            name,
            &ItemId::new(parent),
            kind,
            Timestamps::new(modified, modified, None),
        );
        fs::write(
            self.raw.join(format!("{id}.metadata")),
            record.to_json().unwrap(),
        )
        .unwrap();
        if kind.is_document() {
            fs::write(self.raw.join(id), format!("raw {name}")).unwrap();
        }
    }

    fn mirror(&self, path: &str) -> PathBuf {
        self.config.mirror_root.join(path)
    }

    fn plan(&self, transport: &dyn Transport) -> Vec<String> {
        let session = SyncSession::prepare(&self.config, transport, &SyncPlanner::new()).unwrap();
        session
            .plan()
            .iter()
            .map(|op| format!("{} {}", op.action, op.path))
            .collect()
    }
}

fn mtime(path: &Path) -> i64 {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
}

#[test]
fn test_round_trip_converges() {
    let setup = Setup::new();
    setup.add("n", "Notes", "", NodeKind::Directory, 0);
    setup.add("d", "a", "n", NodeKind::Document, 100);
    let transport = DirectoryTransport::new(&setup.raw);
    let planner = SyncPlanner::new();

    // First run: everything comes from the device.
    let mut session = SyncSession::prepare(&setup.config, &transport, &planner).unwrap();
    assert!(session.renders_documents());
    let plan: Vec<_> = session.plan().iter().map(|op| op.to_string()).collect();
    assert_eq!(
        plan,
        vec![
            "PULL: Notes (only on device)",
            "PULL: Notes/a.pdf (only on device)",
        ]
    );
    let executor = session.executor(&CopyRenderer);
    let report = session.execute(&executor).unwrap();
    assert_eq!(report.summary(), "pulled 2, pushed 0 and dropped 0");
    assert!(report.watermark.is_some());
    assert_eq!(fs::read_to_string(setup.mirror("Notes/a.pdf")).unwrap(), "raw a");
    assert_eq!(mtime(&setup.mirror("Notes/a.pdf")), 100);
    assert!(setup.plan(&transport).is_empty());

    // A file copied onto the mirror after an old sync is pushed.
    Watermark::new(setup.config.watermark_path()).write(1_000).unwrap();
    let new = setup.mirror("Notes/new.pdf");
    fs::write(&new, b"%PDF-1.4").unwrap();
    filetime::set_file_mtime(&new, FileTime::from_unix_time(5_000, 0)).unwrap();

    let mut session = SyncSession::prepare(&setup.config, &transport, &planner).unwrap();
    assert_eq!(session.plan().count(Action::Push), 1);
    assert_eq!(session.plan().len(), 1);
    let executor = session.executor(&CopyRenderer);
    let mut events = executor.subscribe();
    let report = session.execute(&executor).unwrap();
    assert_eq!(report.pushed, 1);
    assert!(report.restarted);
    assert_eq!(transport.restarts(), 1);
    assert!(report.bytes_uploaded >= 8);
    assert!(matches!(events.try_recv(), Ok(SyncEvent::Progress(_))));

    let uploaded: Vec<_> = fs::read_dir(&setup.raw)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".pdf"))
        .collect();
    assert_eq!(uploaded.len(), 1);
    let id = uploaded[0].trim_end_matches(".pdf");
    let record = transport.fetch_record(&ItemId::new(id)).unwrap();
    assert_eq!(record.visible_name, "new");
    assert_eq!(record.parent, "n");
    assert_eq!(record.last_modified, 5_000_000);
    assert!(setup.raw.join(format!("{id}.content")).exists());

    // Pushing does not cause a pull or a second push.
    assert!(setup.plan(&transport).is_empty());

    // Deleting on the device drops the mirror copy.
    fs::remove_file(setup.raw.join("d.metadata")).unwrap();
    assert_eq!(setup.plan(&transport), vec!["DROP Notes/a.pdf"]);
    let mut session = SyncSession::prepare(&setup.config, &transport, &planner).unwrap();
    let executor = session.executor(&CopyRenderer);
    let report = session.execute(&executor).unwrap();
    assert_eq!(report.dropped, 1);
    assert!(!setup.mirror("Notes/a.pdf").exists());
    assert!(setup.mirror("Notes/new.pdf").exists());
}

#[test]
fn test_new_directory_and_contents_are_pushed_together() {
    let setup = Setup::new();
    let transport = DirectoryTransport::new(&setup.raw);
    fs::create_dir_all(setup.mirror("Books/Novels")).unwrap();
    fs::write(setup.mirror("Books/Novels/story.epub"), b"epub").unwrap();

    assert_eq!(
        setup.plan(&transport),
        vec!["PUSH Books", "PUSH Books/Novels", "PUSH Books/Novels/story.epub"]
    );

    let mut session = SyncSession::prepare(&setup.config, &transport, &SyncPlanner::new()).unwrap();
    assert!(!session.renders_documents());
    let executor = session.executor(&CopyRenderer);
    let report = session.execute(&executor).unwrap();
    assert!(report.is_success(), "{report:?}");
    assert!(!setup.config.backup_dir.exists());
    assert_eq!(report.pushed, 3);

    let session = SyncSession::prepare(&setup.config, &transport, &SyncPlanner::new()).unwrap();
    assert!(session.plan().is_empty());
    let names: Vec<_> = session
        .device()
        .iter()
        .map(|node| node.path.to_string())
        .collect();
    assert_eq!(names, vec!["Books", "Books/Novels", "Books/Novels/story.epub"]);
}

#[test]
fn test_kind_conflict_stops_before_any_change() {
    let setup = Setup::new();
    setup.add("x", "Report", "", NodeKind::Directory, 0);
    let transport = DirectoryTransport::new(&setup.raw);
    fs::create_dir_all(&setup.config.mirror_root).unwrap();
    fs::write(setup.mirror("Report"), b"not a directory").unwrap();

    let result = SyncSession::prepare(&setup.config, &transport, &SyncPlanner::new());
    assert!(matches!(result, Err(SyncError::KindConflict { .. })));
    assert!(!setup.config.watermark_path().exists());
}

#[test]
fn test_corrupt_metadata_is_fatal() {
    let setup = Setup::new();
    fs::write(setup.raw.join("bad.metadata"), b"{\"parent\": \"\"}").unwrap();
    let transport = DirectoryTransport::new(&setup.raw);

    let result = SyncSession::prepare(&setup.config, &transport, &SyncPlanner::new());
    assert!(matches!(result, Err(SyncError::CorruptMetadata { .. })));
}

#[test]
fn test_unreachable_device() {
    let setup = Setup::new();
    let transport = DirectoryTransport::new(setup.raw.join("missing"));

    let result = SyncSession::prepare(&setup.config, &transport, &SyncPlanner::new());
    assert!(matches!(result, Err(SyncError::Connectivity { .. })));
}
