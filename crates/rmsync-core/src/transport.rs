//! The device-side collaborator used by the store and the executor.

use std::path::Path;

use crate::error::SyncError;
use crate::node::ItemId;
use crate::record::ItemRecord;

/// Access to the device's raw document store.
///
/// Every method is synchronous; a failure is a [`SyncError::Connectivity`]
/// (or I/O error) and is fatal for the whole run.
pub trait Transport {
    /// Human-readable name of the device, for messages.
    fn name(&self) -> &str;

    /// Verify that the device is reachable and is the expected kind of device.
    fn probe(&self) -> Result<(), SyncError>;

    /// Mirror every `*.metadata` file into `dir`, deleting local files that
    /// no longer exist on the device.
    fn fetch_metadata(&self, dir: &Path) -> Result<(), SyncError>;

    /// Fetch the current, authoritative record of one item.
    fn fetch_record(&self, id: &ItemId) -> Result<ItemRecord, SyncError>;

    /// Mirror the complete raw store (document content) into `dir`.
    fn fetch_content(&self, dir: &Path) -> Result<(), SyncError>;

    /// Upload a local file into the raw store under `remote_name`.
    fn push_file(&self, local: &Path, remote_name: &str) -> Result<(), SyncError>;

    /// Restart the device interface so it picks up new items.
    fn restart_interface(&self) -> Result<(), SyncError>;
}
