//! Synchronization configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default location of the raw document store on the device.
pub const DEFAULT_REMOTE_DIR: &str = "/home/root/.local/share/remarkable/xochitl";

/// Name of the watermark file inside the mirror root.
pub const WATERMARK_FILE: &str = ".last_sync";

/// Configuration of one mirror directory and its local caches.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SyncConfig {
    /// Local directory holding the rendered documents.
    pub mirror_root: PathBuf,

    /// Local cache of the device's `*.metadata` files.
    pub metadata_dir: PathBuf,

    /// Local copy of the device's raw store, used as renderer input.
    pub backup_dir: PathBuf,

    /// Extension appended to documents whose name lacks a recognized one.
    #[builder(default = "\"pdf\".to_string()")]
    #[serde(default = "default_render_extension")]
    pub render_extension: String,

    /// Extensions a device document name may already carry.
    #[builder(default = "default_recognized_extensions()")]
    #[serde(default = "default_recognized_extensions")]
    pub recognized_extensions: Vec<String>,
}

fn default_render_extension() -> String {
    "pdf".to_string()
}

fn default_recognized_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "epub".to_string()]
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.mirror_root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Mirror root cannot be empty".to_string());
            }
            None => return Err("Mirror root is required".to_string()),
            _ => {}
        }
        if let Some(ref ext) = self.render_extension {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(format!("Invalid render extension \"{ext}\""));
            }
        }
        Ok(())
    }
}

impl SyncConfig {
    /// Create a new sync config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Create a config keeping the caches next to the mirror root.
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        let mirror_root = mirror_root.into();
        let cache = mirror_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = mirror_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "mirror".to_string());

        Self {
            metadata_dir: cache.join(format!("{stem}_metadata")),
            backup_dir: cache.join(format!("{stem}_backup")),
            mirror_root,
            render_extension: default_render_extension(),
            recognized_extensions: default_recognized_extensions(),
        }
    }

    /// Path of the watermark file.
    pub fn watermark_path(&self) -> PathBuf {
        self.mirror_root.join(WATERMARK_FILE)
    }

    /// Check if a device document name already carries a recognized extension.
    pub fn has_recognized_extension(&self, name: &str) -> bool {
        crate::node::extension_of(name).is_some_and(|ext| {
            self.recognized_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }

    /// Last path component of a device item as it appears on the mirror.
    pub fn mirror_name(&self, name: &str, is_document: bool) -> String {
        if is_document && !self.has_recognized_extension(name) {
            format!("{name}.{}", self.render_extension)
        } else {
            name.to_string()
        }
    }
}

/// How to reach the device.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct DeviceConfig {
    /// SSH host name or alias (password-less login required).
    #[builder(default = "\"remarkable\".to_string()")]
    pub host: String,

    /// Raw document store on the device.
    #[builder(default = "DEFAULT_REMOTE_DIR.to_string()")]
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// SSH connect timeout in seconds.
    #[builder(default = "1")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
}

fn default_remote_dir() -> String {
    DEFAULT_REMOTE_DIR.to_string()
}

fn default_connect_timeout() -> u32 {
    1
}

impl DeviceConfig {
    /// Create a new device config builder.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }

    /// Create a config for a host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            remote_dir: default_remote_dir(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new("remarkable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::builder()
            .mirror_root("/home/user/remarkable")
            .metadata_dir("/tmp/meta")
            .backup_dir("/tmp/raw")
            .build()
            .unwrap();

        assert_eq!(config.mirror_root, PathBuf::from("/home/user/remarkable"));
        assert_eq!(config.render_extension, "pdf");
        assert_eq!(config.recognized_extensions, vec!["pdf", "epub"]);
    }

    #[test]
    fn test_config_builder_requires_root() {
        let result = SyncConfig::builder()
            .metadata_dir("/tmp/meta")
            .backup_dir("/tmp/raw")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_simple() {
        let config = SyncConfig::new("/home/user/remarkable");
        assert_eq!(config.metadata_dir, PathBuf::from("/home/user/remarkable_metadata"));
        assert_eq!(config.backup_dir, PathBuf::from("/home/user/remarkable_backup"));
        assert_eq!(
            config.watermark_path(),
            PathBuf::from("/home/user/remarkable/.last_sync")
        );
    }

    #[test]
    fn test_mirror_name() {
        let config = SyncConfig::new("/m");
        assert_eq!(config.mirror_name("Meeting", true), "Meeting.pdf");
        assert_eq!(config.mirror_name("paper.pdf", true), "paper.pdf");
        assert_eq!(config.mirror_name("Book.EPUB", true), "Book.EPUB");
        assert_eq!(config.mirror_name("b.doc", true), "b.doc.pdf");
        assert_eq!(config.mirror_name("Projects", false), "Projects");
    }

    #[test]
    fn test_recognized_extensions_ignore_case() {
        let config = SyncConfig::new("/m");
        assert!(config.has_recognized_extension("Scan.PDF"));
        assert!(config.has_recognized_extension("Novel.Epub"));
        assert_eq!(config.mirror_name("Scan.PDF", true), "Scan.PDF");
        assert!(!config.has_recognized_extension("Scan.PDFX"));
    }

    #[test]
    fn test_device_config_defaults() {
        let config = DeviceConfig::builder().host("tablet").build().unwrap();
        assert_eq!(config.host, "tablet");
        assert_eq!(config.remote_dir, DEFAULT_REMOTE_DIR);
        assert_eq!(config.connect_timeout_secs, 1);
    }
}
