//! Executes a sync plan against the device and the mirror.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use rmsync_core::{
    Action, ItemId, ItemRecord, Locator, NodeId, Operation, SyncConfig, SyncError, SyncNode,
    SyncTree, Transport, Watermark,
};
use rmsync_plan::Plan;
use rmsync_scan::{Correspondence, MetadataStore, CONTENT_EXTENSION, METADATA_EXTENSION};

use crate::progress::{ExecutionReport, SyncEvent, SyncProgress};
use crate::render::Renderer;
use crate::{OperationError, OPERATION_CHANNEL_SIZE};

/// Mutable view of everything a run touches.
pub struct SyncState<'s> {
    /// Local metadata cache; pushed records are written through it.
    pub store: &'s mut MetadataStore,
    /// Device tree; pushed items are appended to it.
    pub device: &'s mut SyncTree,
    /// Mirror tree as scanned before planning.
    pub mirror: &'s SyncTree,
    /// Path correspondence shared with the planner.
    pub resolver: &'s Correspondence,
}

/// Executes operations strictly in plan order.
///
/// Render and precondition failures only fail their own operation. Any other
/// failure stops the run; operations already applied stay applied. The
/// watermark is written only when every operation succeeded.
pub struct SyncExecutor<'a> {
    config: &'a SyncConfig,
    transport: &'a dyn Transport,
    renderer: &'a dyn Renderer,
    events: broadcast::Sender<SyncEvent>,
}

impl<'a> SyncExecutor<'a> {
    /// Create an executor.
    pub fn new(
        config: &'a SyncConfig,
        transport: &'a dyn Transport,
        renderer: &'a dyn Renderer,
    ) -> Self {
        let (events, _) = broadcast::channel(OPERATION_CHANNEL_SIZE);
        Self {
            config,
            transport,
            renderer,
            events,
        }
    }

    /// Receive progress events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Execute every operation of `plan`, then write the watermark and
    /// restart the device interface as needed.
    ///
    /// Operation failures are part of the report. An error is returned only
    /// when the watermark cannot be written or the restart fails.
    pub fn execute(&self, plan: &Plan, state: SyncState<'_>) -> Result<ExecutionReport, SyncError> {
        let SyncState {
            store,
            device,
            mirror,
            resolver,
        } = state;

        let total = plan.len();
        let mut progress = SyncProgress::new(total);
        let mut report = ExecutionReport::default();
        let mut needs_refresh = false;

        for (i, operation) in plan.iter().enumerate() {
            info!("({}/{total}) {operation}", i + 1);
            progress.set_current(Some(operation.clone()));
            let _ = self.events.send(SyncEvent::Progress(progress.clone()));

            let result = match operation.action {
                Action::Pull => self.pull(operation, device),
                Action::Push => self.push(operation, store, device, mirror, resolver),
                Action::Drop => self.drop_item(operation, mirror),
            };

            match result {
                Ok(bytes) => {
                    needs_refresh |= operation.action == Action::Push;
                    report.record(operation.action, bytes);
                    progress.complete(bytes);
                }
                Err(err) if err.is_item_local() => {
                    warn!("{operation} failed: {err}");
                    let failure = OperationError::for_operation(operation, err.to_string());
                    report.errors.push(failure.clone());
                    progress.add_error(failure);
                    progress.complete(0);
                }
                Err(err) => {
                    error!("{operation} failed, stopping: {err}");
                    report.aborted = Some(OperationError::for_operation(operation, err.to_string()));
                    break;
                }
            }
        }

        let finished = self.finish(&mut report, needs_refresh);
        let _ = self.events.send(SyncEvent::Complete(report.clone()));
        finished.map(|()| report)
    }

    /// Write the watermark if nothing failed, then restart the interface if
    /// anything was pushed. Both are attempted even if the other fails.
    fn finish(&self, report: &mut ExecutionReport, needs_refresh: bool) -> Result<(), SyncError> {
        let mut outcome = Ok(());

        if report.is_success() {
            match Watermark::new(self.config.watermark_path()).write_now() {
                Ok(now) => report.watermark = Some(now),
                Err(err) => outcome = Err(err),
            }
        } else {
            warn!(failed = report.failed(), "Not updating the sync watermark");
        }

        if needs_refresh {
            match self.transport.restart_interface() {
                Ok(()) => report.restarted = true,
                Err(err) => outcome = outcome.and(Err(err)),
            }
        }

        outcome
    }

    /// Materialize a device item on the mirror.
    fn pull(&self, operation: &Operation, device: &SyncTree) -> Result<u64, SyncError> {
        let node = device_node(operation, device)?;
        let target = self.config.mirror_root.join(operation.path.as_str());

        if node.is_dir() {
            fs::create_dir_all(&target).map_err(|e| SyncError::io(&target, e))?;
            return Ok(0);
        }

        let id = item_id(operation, node)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }

        let input = self.config.backup_dir.join(id.as_str());
        self.renderer
            .render(&input, &target)
            .map_err(|err| match err {
                SyncError::Render { message, .. } => SyncError::Render {
                    path: operation.path.clone(),
                    message,
                },
                other => other,
            })?;
        if !target.is_file() {
            return Err(SyncError::Render {
                path: operation.path.clone(),
                message: format!("{} produced no output", self.renderer.name()),
            });
        }

        // Later comparisons read these times back from the mirror.
        let times = node.timestamps;
        filetime::set_file_times(
            &target,
            FileTime::from_unix_time(times.accessed, 0),
            FileTime::from_unix_time(times.modified, 0),
        )
        .map_err(|e| SyncError::io(&target, e))?;

        debug!(id = %id, output = %target.display(), "Pulled");
        Ok(0)
    }

    /// Upload a mirror item, creating it on the device if needed.
    fn push(
        &self,
        operation: &Operation,
        store: &mut MetadataStore,
        device: &mut SyncTree,
        mirror: &SyncTree,
        resolver: &Correspondence,
    ) -> Result<u64, SyncError> {
        let node = operation
            .mirror
            .and_then(|id| mirror.get(id))
            .ok_or_else(|| SyncError::precondition("push", operation.path.clone(), "not on the mirror"))?;
        let source = mirror_path(self.config, operation, node);

        let (id, record, new_parent) = match operation.device {
            Some(existing) => {
                // The device may have changed fields the cache does not know about.
                let id = item_id(operation, device.node(existing))?.clone();
                let mut record = self.transport.fetch_record(&id)?;
                record.touch(node.timestamps.modified);
                (id, record, None)
            }
            None => {
                let parent = self.device_parent(operation, device, resolver)?;
                let parent_id = match &device.node(parent).locator {
                    Locator::Device(id) => id.clone(),
                    _ => ItemId::new(ItemId::ROOT),
                };
                let id = store.fresh_id();
                let record = ItemRecord::new(
                    self.display_name(node),
                    &parent_id,
                    node.kind,
                    node.timestamps,
                );
                (id, record, Some(parent))
            }
        };

        let timestamps = record.timestamps();
        let visible_name = record.visible_name.clone();

        let mut uploaded = 0;
        let metadata = store.write_record(&id, record)?;
        uploaded += self.upload(&metadata, &format!("{id}.{METADATA_EXTENSION}"))?;
        let content = store.write_content(&id)?;
        uploaded += self.upload(&content, &format!("{id}.{CONTENT_EXTENSION}"))?;

        if node.is_document() {
            let extension = node.extension().ok_or_else(|| {
                SyncError::precondition("push", operation.path.clone(), "file has no extension")
            })?;
            let remote_name = format!("{id}.{}", extension.to_ascii_lowercase());
            uploaded += self.upload(&source, &remote_name)?;
        }

        if let Some(parent) = new_parent {
            let added = device.insert(
                parent,
                Locator::Device(id.clone()),
                visible_name,
                &node.name,
                node.kind,
                timestamps,
            );
            resolver.remember_device(device.node(added));
        }

        debug!(id = %id, bytes = uploaded, "Pushed");
        Ok(uploaded)
    }

    /// Remove a mirror item. Directories must already be empty.
    fn drop_item(&self, operation: &Operation, mirror: &SyncTree) -> Result<u64, SyncError> {
        let node = operation
            .mirror
            .and_then(|id| mirror.get(id))
            .ok_or_else(|| SyncError::precondition("drop", operation.path.clone(), "not on the mirror"))?;
        let target = mirror_path(self.config, operation, node);

        let removed = if node.is_dir() {
            fs::remove_dir(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.map_err(|e| SyncError::io(&target, e))?;

        debug!(path = %target.display(), "Dropped");
        Ok(0)
    }

    /// The device directory a new item goes into.
    fn device_parent(
        &self,
        operation: &Operation,
        device: &SyncTree,
        resolver: &Correspondence,
    ) -> Result<NodeId, SyncError> {
        let parent_path = operation
            .path
            .rsplit_once('/')
            .map_or("", |(parent, _)| parent);

        let parent = resolver.find_on_device(device, parent_path).ok_or_else(|| {
            SyncError::precondition(
                "push",
                operation.path.clone(),
                format!("parent directory \"{parent_path}\" is not on the device"),
            )
        })?;
        if !device.node(parent).is_dir() {
            return Err(SyncError::precondition(
                "push",
                operation.path.clone(),
                format!("\"{parent_path}\" is not a directory on the device"),
            ));
        }
        Ok(parent)
    }

    /// Device name for a new item, chosen so it maps back to the same path.
    fn display_name(&self, node: &SyncNode) -> String {
        if node.is_document() && node.extension() == Some(self.config.render_extension.as_str()) {
            if let Some((stem, _)) = node.name.rsplit_once('.') {
                if !self.config.has_recognized_extension(stem) {
                    return stem.to_string();
                }
            }
        }
        node.name.to_string()
    }

    fn upload(&self, local: &Path, remote_name: &str) -> Result<u64, SyncError> {
        let size = fs::metadata(local)
            .map_err(|e| SyncError::io(local, e))?
            .len();
        self.transport.push_file(local, remote_name)?;
        Ok(size)
    }
}

fn device_node<'t>(operation: &Operation, device: &'t SyncTree) -> Result<&'t SyncNode, SyncError> {
    operation
        .device
        .and_then(|id| device.get(id))
        .ok_or_else(|| SyncError::precondition("pull", operation.path.clone(), "not on the device"))
}

fn item_id<'n>(operation: &Operation, node: &'n SyncNode) -> Result<&'n ItemId, SyncError> {
    node.locator.item_id().ok_or_else(|| {
        SyncError::precondition(
            operation.action.verb(),
            operation.path.clone(),
            "device item has no identifier",
        )
    })
}

fn mirror_path(config: &SyncConfig, operation: &Operation, node: &SyncNode) -> PathBuf {
    node.locator
        .mirror_path()
        .cloned()
        .unwrap_or_else(|| config.mirror_root.join(operation.path.as_str()))
}
