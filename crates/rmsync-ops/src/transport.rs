//! Transports to the device's raw document store.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use rmsync_core::{DeviceConfig, ItemId, ItemRecord, SyncError, Transport};
use rmsync_scan::METADATA_EXTENSION;

/// What `uname -n` prints on the device.
const DEVICE_HOSTNAME: &str = "reMarkable";

/// Service that draws the device interface.
const INTERFACE_SERVICE: &str = "xochitl";

/// Reaches the device over SSH, using `ssh`, `rsync` and `scp`.
///
/// Password-less login to the configured host is required.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: DeviceConfig,
}

impl SshTransport {
    /// Create a transport for a device.
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// The device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn timeout_option(&self) -> String {
        format!("ConnectTimeout={}", self.config.connect_timeout_secs)
    }

    /// `host:<remote dir>/<name>`.
    fn remote(&self, name: &str) -> String {
        format!("{}:{}/{name}", self.config.host, self.config.remote_dir)
    }

    /// Run a shell command on the device and return its standard output.
    fn ssh(&self, command: &str) -> Result<String, SyncError> {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg(self.timeout_option())
            .arg(&self.config.host)
            .arg(command);
        self.run(cmd)
    }

    fn rsync(&self, args: &[&str], dir: &Path) -> Result<(), SyncError> {
        let mut destination = OsString::from(dir.as_os_str());
        destination.push("/");

        let mut cmd = Command::new("rsync");
        cmd.arg("-az")
            .args(args)
            .arg("-e")
            .arg(format!("ssh -o {}", self.timeout_option()))
            .arg(self.remote(""))
            .arg(destination);
        self.run(cmd).map(drop)
    }

    fn run(&self, mut cmd: Command) -> Result<String, SyncError> {
        debug!(command = ?cmd, "Running");
        let output = cmd
            .output()
            .map_err(|e| SyncError::connectivity(&self.config.host, format!("{cmd:?}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{cmd:?} exited with {}", output.status),
                reason => reason.to_string(),
            };
            return Err(SyncError::connectivity(&self.config.host, message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Transport for SshTransport {
    fn name(&self) -> &str {
        &self.config.host
    }

    fn probe(&self) -> Result<(), SyncError> {
        let hostname = self.ssh("uname -n")?;
        if hostname.trim() != DEVICE_HOSTNAME {
            return Err(SyncError::connectivity(
                &self.config.host,
                format!("not a reMarkable (uname -n printed \"{}\")", hostname.trim()),
            ));
        }
        Ok(())
    }

    fn fetch_metadata(&self, dir: &Path) -> Result<(), SyncError> {
        let include = format!("--include=*.{METADATA_EXTENSION}");
        self.rsync(&["--delete-excluded", &include, "--exclude=*"], dir)
    }

    fn fetch_record(&self, id: &ItemId) -> Result<ItemRecord, SyncError> {
        let path = format!("{}/{id}.{METADATA_EXTENSION}", self.config.remote_dir);
        let text = self.ssh(&format!("cat '{path}'"))?;
        ItemRecord::from_json(id, &text)
    }

    fn fetch_content(&self, dir: &Path) -> Result<(), SyncError> {
        info!("Backing up raw files from {} to {}", self.config.host, dir.display());
        self.rsync(&["--delete"], dir)
    }

    fn push_file(&self, local: &Path, remote_name: &str) -> Result<(), SyncError> {
        let mut cmd = Command::new("scp");
        cmd.arg("-o")
            .arg(self.timeout_option())
            .arg(local)
            .arg(self.remote(remote_name));
        self.run(cmd).map(drop)
    }

    fn restart_interface(&self) -> Result<(), SyncError> {
        info!("Restarting the interface on {}", self.config.host);
        self.ssh(&format!("systemctl restart {INTERFACE_SERVICE}"))
            .map(drop)
    }
}

/// Treats a local directory as the device's raw store.
///
/// Useful for a device mounted over USB and for tests.
#[derive(Debug)]
pub struct DirectoryTransport {
    root: PathBuf,
    name: String,
    restarts: AtomicUsize,
}

impl DirectoryTransport {
    /// Create a transport for the raw store at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.display().to_string();
        Self {
            root,
            name,
            restarts: AtomicUsize::new(0),
        }
    }

    /// The raw store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How often the interface was "restarted".
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }

    fn metadata_names(dir: &Path) -> Result<HashSet<OsString>, SyncError> {
        let mut names = HashSet::new();
        for entry in fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))? {
            let path = entry.map_err(|e| SyncError::io(dir, e))?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(METADATA_EXTENSION)
            {
                if let Some(name) = path.file_name() {
                    names.insert(name.to_os_string());
                }
            }
        }
        Ok(names)
    }
}

impl Transport for DirectoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> Result<(), SyncError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(SyncError::connectivity(&self.name, "not a directory"))
        }
    }

    fn fetch_metadata(&self, dir: &Path) -> Result<(), SyncError> {
        let remote = Self::metadata_names(&self.root)?;
        for stale in Self::metadata_names(dir)?.difference(&remote) {
            let path = dir.join(stale);
            debug!(path = %path.display(), "Removing stale metadata");
            fs::remove_file(&path).map_err(|e| SyncError::io(&path, e))?;
        }
        for name in &remote {
            let source = self.root.join(name);
            fs::copy(&source, dir.join(name)).map_err(|e| SyncError::io(&source, e))?;
        }
        Ok(())
    }

    fn fetch_record(&self, id: &ItemId) -> Result<ItemRecord, SyncError> {
        let path = self.root.join(format!("{id}.{METADATA_EXTENSION}"));
        let text = fs::read_to_string(&path).map_err(|e| SyncError::io(&path, e))?;
        ItemRecord::from_json(id, &text)
    }

    fn fetch_content(&self, dir: &Path) -> Result<(), SyncError> {
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;
        }
        copy_dir_recursive(&self.root, dir)
    }

    fn push_file(&self, local: &Path, remote_name: &str) -> Result<(), SyncError> {
        fs::copy(local, self.root.join(remote_name))
            .map(drop)
            .map_err(|e| SyncError::io(local, e))
    }

    fn restart_interface(&self) -> Result<(), SyncError> {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        debug!(root = %self.root.display(), "Nothing to restart for a directory store");
        Ok(())
    }
}

/// Recursively copy a directory.
fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dest).map_err(|e| SyncError::io(dest, e))?;

    for entry in fs::read_dir(source).map_err(|e| SyncError::io(source, e))? {
        let entry = entry.map_err(|e| SyncError::io(source, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(|e| SyncError::io(&path, e))?;
        }
    }
    Ok(())
}
