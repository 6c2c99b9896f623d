//! One synchronization run, from fetching metadata to executing the plan.

use std::fs;

use tracing::info;

use rmsync_core::watermark::describe;
use rmsync_core::{Action, SyncConfig, SyncError, SyncTree, Transport, Watermark};
use rmsync_plan::{Plan, SyncPlanner};
use rmsync_scan::{Correspondence, DeviceTreeBuilder, MetadataStore, MirrorScanner};

use crate::executor::{SyncExecutor, SyncState};
use crate::progress::ExecutionReport;
use crate::render::Renderer;

/// Trees and plan for one run.
///
/// [`prepare`](Self::prepare) does everything that only reads: it refreshes
/// the metadata cache, builds both trees and computes the plan. Nothing on
/// the device or the mirror changes until [`execute`](Self::execute).
pub struct SyncSession<'a> {
    config: &'a SyncConfig,
    transport: &'a dyn Transport,
    store: MetadataStore,
    device: SyncTree,
    mirror: SyncTree,
    resolver: Correspondence,
    plan: Plan,
}

impl<'a> SyncSession<'a> {
    /// Fetch, build and plan.
    pub fn prepare(
        config: &'a SyncConfig,
        transport: &'a dyn Transport,
        planner: &SyncPlanner,
    ) -> Result<Self, SyncError> {
        transport.probe()?;
        fs::create_dir_all(&config.mirror_root).map_err(|e| SyncError::io(&config.mirror_root, e))?;

        let store = MetadataStore::load(transport, &config.metadata_dir)?;
        let device = DeviceTreeBuilder::new(config).build(&store)?;
        let mirror = MirrorScanner::new().scan(&config.mirror_root)?;
        let watermark = Watermark::new(config.watermark_path()).read()?;
        info!(
            device = device.len() - 1,
            mirror = mirror.len() - 1,
            last_sync = %describe(watermark),
            "Comparing trees"
        );

        let resolver = Correspondence::new();
        let plan = planner.plan(&device, &mirror, &resolver, watermark)?;

        Ok(Self {
            config,
            transport,
            store,
            device,
            mirror,
            resolver,
            plan,
        })
    }

    /// The computed plan.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The device tree.
    pub fn device(&self) -> &SyncTree {
        &self.device
    }

    /// The mirror tree.
    pub fn mirror(&self) -> &SyncTree {
        &self.mirror
    }

    /// The metadata snapshot.
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Check if executing the plan renders at least one device document.
    pub fn renders_documents(&self) -> bool {
        self.plan.iter().any(|op| {
            op.action == Action::Pull
                && op
                    .device
                    .is_some_and(|id| self.device.node(id).is_document())
        })
    }

    /// Build an executor for this session.
    pub fn executor<'r>(&self, renderer: &'r dyn Renderer) -> SyncExecutor<'r>
    where
        'a: 'r,
    {
        SyncExecutor::new(self.config, self.transport, renderer)
    }

    /// Execute the plan with `executor`.
    ///
    /// The raw store is backed up first when a document has to be rendered.
    pub fn execute(&mut self, executor: &SyncExecutor<'_>) -> Result<ExecutionReport, SyncError> {
        if self.renders_documents() {
            fs::create_dir_all(&self.config.backup_dir)
                .map_err(|e| SyncError::io(&self.config.backup_dir, e))?;
            self.transport.fetch_content(&self.config.backup_dir)?;
        }

        executor.execute(
            &self.plan,
            SyncState {
                store: &mut self.store,
                device: &mut self.device,
                mirror: &self.mirror,
                resolver: &self.resolver,
            },
        )
    }
}
