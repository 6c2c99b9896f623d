//! Optional settings file, overridden by command-line flags.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use rmsync_core::DEFAULT_REMOTE_DIR;

/// Contents of `<config dir>/rmsync/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SSH host name or alias of the device.
    pub host: String,
    /// Renderer executable (name or path).
    pub renderer: String,
    /// Extra directory searched for the renderer.
    pub renderer_dir: Option<PathBuf>,
    /// Mirror directory.
    pub output_dir: PathBuf,
    /// Raw document store on the device.
    pub remote_dir: String,
    /// SSH connect timeout in seconds.
    pub connect_timeout_secs: u32,
    /// Extensions new mirror documents may have.
    pub pushable_extensions: Vec<String>,
    /// Show desktop notifications.
    pub notify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "remarkable".to_string(),
            renderer: "render_usb.py".to_string(),
            renderer_dir: dirs::config_dir().map(|d| d.join("rmsync").join("renderers")),
            output_dir: PathBuf::from("remarkable"),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            connect_timeout_secs: 1,
            pushable_extensions: vec!["pdf".to_string(), "epub".to_string()],
            notify: true,
        }
    }
}

impl Settings {
    /// Get the default settings file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rmsync").join("config.toml"))
    }

    /// Load settings from `path`, or from the default location if it exists.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Directory for the metadata cache and the raw backup of one device.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("rmsync").join(&self.host))
    }
}
