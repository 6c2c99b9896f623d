//! Plan construction: pair enumeration, decisions and ordering.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use compact_str::CompactString;
use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rmsync_core::{extension_of, Action, Operation, Reason, SyncError, SyncTree};
use rmsync_scan::Correspondence;

use crate::decision::{decide, Decision, Pair};

/// Configuration for the sync planner.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct PlanConfig {
    /// Extensions the device can import; other new mirror documents are skipped.
    #[builder(default = "vec![\"pdf\".to_string(), \"epub\".to_string()]")]
    pub pushable_extensions: Vec<String>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            pushable_extensions: vec!["pdf".to_string(), "epub".to_string()],
        }
    }
}

impl PlanConfig {
    /// Create a new config builder.
    pub fn builder() -> PlanConfigBuilder {
        PlanConfigBuilder::default()
    }

    /// Check if a mirror file name can be uploaded as a new document.
    pub fn is_pushable(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| {
            self.pushable_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }
}

/// An ordered list of operations that converges both trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Operations in execution order.
    pub operations: Vec<Operation>,
    /// Number of pairs that needed nothing.
    pub skipped: usize,
    /// New mirror documents that the device cannot import.
    pub unpushable: Vec<CompactString>,
    /// Watermark the plan was computed against.
    pub watermark: Option<i64>,
}

impl Plan {
    /// Check if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Iterate over operations in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Number of operations per action.
    pub fn counts(&self) -> HashMap<Action, usize> {
        self.operations.iter().map(|op| op.action).counts()
    }

    /// Number of operations with the given action.
    pub fn count(&self, action: Action) -> usize {
        self.operations.iter().filter(|op| op.action == action).count()
    }

    /// Get a human-readable summary, e.g. "3 to pull, 1 to push, 0 to drop".
    pub fn summary(&self) -> String {
        format!(
            "{} to pull, {} to push, {} to drop",
            self.count(Action::Pull),
            self.count(Action::Push),
            self.count(Action::Drop)
        )
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Computes the plan for one device tree and one mirror tree.
#[derive(Debug, Default)]
pub struct SyncPlanner {
    config: PlanConfig,
}

impl SyncPlanner {
    /// Create a planner with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner with custom config.
    pub fn with_config(config: PlanConfig) -> Self {
        Self { config }
    }

    /// The planner's configuration.
    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Enumerate every pair, decide each one and order the result.
    ///
    /// Fails without producing any operation when a directory and a document
    /// share a path.
    pub fn plan(
        &self,
        device: &SyncTree,
        mirror: &SyncTree,
        resolver: &Correspondence,
        watermark: Option<i64>,
    ) -> Result<Plan, SyncError> {
        let mut plan = Plan {
            watermark,
            ..Plan::default()
        };
        let mut operations = Vec::new();

        for device_node in device.iter() {
            let pair = match resolver.on_mirror(mirror, device_node) {
                Some(id) => {
                    let mirror_node = mirror.node(id);
                    if mirror_node.kind != device_node.kind {
                        return Err(SyncError::KindConflict {
                            path: device_node.path.clone(),
                            first: device_node.kind,
                            second: mirror_node.kind,
                        });
                    }
                    Pair::Both {
                        device: device_node,
                        mirror: mirror_node,
                    }
                }
                None => Pair::DeviceOnly(device_node),
            };
            self.record(pair, decide(pair, watermark), &mut plan, &mut operations);
        }

        // The device never had a directory that is new on the mirror, so it
        // cannot have deleted anything inside it.
        let mut new_dirs = HashSet::new();
        for mirror_node in mirror.iter() {
            if resolver.on_device(device, mirror_node).is_some() {
                continue;
            }
            let pair = Pair::MirrorOnly(mirror_node);
            let added = Decision::Act(Action::Push, Reason::AddedOnMirror);
            let decision = if mirror_node.parent.is_some_and(|p| new_dirs.contains(&p)) {
                added
            } else {
                decide(pair, watermark)
            };
            if mirror_node.is_dir() && decision == added {
                new_dirs.insert(mirror_node.id);
            }
            self.record(pair, decision, &mut plan, &mut operations);
        }

        plan.operations = operations.into_iter().sorted_by(execution_order).collect();

        info!(
            operations = plan.len(),
            skipped = plan.skipped,
            unpushable = plan.unpushable.len(),
            "Planned sync"
        );
        Ok(plan)
    }

    fn record(
        &self,
        pair: Pair<'_>,
        decision: Decision,
        plan: &mut Plan,
        operations: &mut Vec<Operation>,
    ) {
        let (action, reason) = match decision {
            Decision::Skip => {
                plan.skipped += 1;
                return;
            }
            Decision::Act(action, reason) => (action, reason),
        };

        if let Pair::MirrorOnly(node) = pair {
            if action == Action::Push && node.is_document() && !self.config.is_pushable(&node.name) {
                warn!(path = %node.path, "Skipping file the device cannot import");
                plan.unpushable.push(node.path.clone());
                return;
            }
        }

        let operation = Operation::new(
            action,
            reason,
            pair.path(),
            pair.device().map(|n| n.id),
            pair.mirror().map(|n| n.id),
        );
        debug!(%operation, "Decided");
        operations.push(operation);
    }
}

/// PULLs, then PUSHes, then DROPs. Creations go parents first and removals
/// go children first; ties break on the path so the order is total.
fn execution_order(a: &Operation, b: &Operation) -> Ordering {
    a.action.cmp(&b.action).then_with(|| match a.action {
        Action::Pull | Action::Push => a
            .depth()
            .cmp(&b.depth())
            .then_with(|| a.path.cmp(&b.path)),
        Action::Drop => b
            .depth()
            .cmp(&a.depth())
            .then_with(|| b.path.cmp(&a.path)),
    })
}
