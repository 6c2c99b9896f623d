//! Persisted time of the last successful synchronization.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SyncError;

/// The `.last_sync` file in the mirror root.
///
/// Holds the Unix time in seconds at which the last sync completed. A missing
/// file means "never synced", which [`read`](Watermark::read) reports as
/// `None` so every mirror-only item counts as created after the last sync.
#[derive(Debug, Clone)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    /// Create a handle for a watermark file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the watermark file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the watermark, `None` if the mirror was never synced.
    pub fn read(&self) -> Result<Option<i64>, SyncError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        content
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::InvalidWatermark {
                path: self.path.clone(),
                content,
            })
    }

    /// Persist a watermark.
    pub fn write(&self, timestamp: i64) -> Result<(), SyncError> {
        fs::write(&self.path, format!("{timestamp}\n"))
            .map_err(|e| SyncError::io(&self.path, e))?;
        debug!(path = %self.path.display(), timestamp, "wrote watermark");
        Ok(())
    }

    /// Persist the current time and return it.
    pub fn write_now(&self) -> Result<i64, SyncError> {
        let now = Utc::now().timestamp();
        self.write(now)?;
        Ok(now)
    }
}

/// Human-readable form of a watermark for logs and prompts.
pub fn describe(watermark: Option<i64>) -> String {
    match watermark.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}
