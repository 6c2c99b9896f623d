//! Local snapshot of the device's metadata records.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};
use uuid::Uuid;

use rmsync_core::{ItemId, ItemRecord, SyncError, Transport};

/// Extension of device metadata files.
pub const METADATA_EXTENSION: &str = "metadata";
/// Extension of device content descriptors.
pub const CONTENT_EXTENSION: &str = "content";

/// In-memory snapshot of every `<id>.metadata` record, keyed by identifier.
///
/// The snapshot is backed by a local cache directory that mirrors the
/// device's namespace exactly, so identifiers deleted on the device disappear
/// instead of lingering as stale entries.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
    records: IndexMap<ItemId, ItemRecord>,
}

impl MetadataStore {
    /// Refresh the cache in `dir` from the device, then parse it.
    pub fn load(transport: &dyn Transport, dir: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SyncError::io(&dir, e))?;

        info!("Downloading metadata from {} to {}", transport.name(), dir.display());
        transport.fetch_metadata(&dir)?;

        Self::open(dir)
    }

    /// Parse an existing cache directory without contacting the device.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let dir = dir.into();
        let entries = fs::read_dir(&dir).map_err(|e| SyncError::io(&dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(ItemId::new(stem));
            }
        }
        ids.sort();

        let mut records = IndexMap::with_capacity(ids.len());
        for id in ids {
            let path = dir.join(format!("{id}.{METADATA_EXTENSION}"));
            let text = fs::read_to_string(&path).map_err(|e| SyncError::io(&path, e))?;
            let record = ItemRecord::from_json(&id, &text)?;
            debug!(%id, name = %record.visible_name, parent = %record.parent, "read record");
            records.insert(id, record);
        }

        info!("Loaded {} metadata records", records.len());
        Ok(Self { dir, records })
    }

    /// Cache directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get a record by identifier.
    pub fn get(&self, id: &ItemId) -> Option<&ItemRecord> {
        self.records.get(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.records.contains_key(id)
    }

    /// Iterate over all records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &ItemRecord)> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mint an identifier no existing record uses.
    pub fn fresh_id(&self) -> ItemId {
        loop {
            let id = ItemId::new(Uuid::new_v4().to_string());
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Write a record into the cache and return the file to upload.
    pub fn write_record(&mut self, id: &ItemId, record: ItemRecord) -> Result<PathBuf, SyncError> {
        let path = self.dir.join(format!("{id}.{METADATA_EXTENSION}"));
        fs::write(&path, record.to_json()?).map_err(|e| SyncError::io(&path, e))?;
        self.records.insert(id.clone(), record);
        Ok(path)
    }

    /// Write the empty `.content` descriptor the device needs to list an item.
    pub fn write_content(&self, id: &ItemId) -> Result<PathBuf, SyncError> {
        let path = self.dir.join(format!("{id}.{CONTENT_EXTENSION}"));
        fs::write(&path, "{}\n").map_err(|e| SyncError::io(&path, e))?;
        Ok(path)
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            records: IndexMap::new(),
        }
    }
}

impl FromIterator<(ItemId, ItemRecord)> for MetadataStore {
    fn from_iter<T: IntoIterator<Item = (ItemId, ItemRecord)>>(iter: T) -> Self {
        let mut records: IndexMap<_, _> = iter.into_iter().collect();
        records.sort_keys();
        Self {
            dir: PathBuf::new(),
            records,
        }
    }
}
