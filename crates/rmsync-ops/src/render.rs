//! Turning raw device documents into mirror files.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use rmsync_core::SyncError;

/// Converts a raw device document into a file on the mirror.
pub trait Renderer {
    /// Name shown in prompts and logs.
    fn name(&self) -> &str;

    /// Render the raw document whose files start with `input` into `output`.
    ///
    /// The caller verifies that `output` exists afterwards.
    fn render(&self, input: &Path, output: &Path) -> Result<(), SyncError>;
}

/// Runs `<program> <input> <output>` and treats a non-zero exit as failure.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    program: PathBuf,
    name: String,
}

impl ExternalRenderer {
    /// Use the executable at `program` as is.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| program.display().to_string());
        Self { program, name }
    }

    /// Find a renderer by name or path.
    ///
    /// Tries `name` as a path, then `name` inside `search_dir`, then `PATH`.
    pub fn locate(name: &str, search_dir: Option<&Path>) -> Result<Self, SyncError> {
        let direct = Path::new(name);
        if direct.components().count() > 1 && direct.is_file() {
            return Ok(Self::new(direct));
        }
        if let Some(candidate) = search_dir.map(|dir| dir.join(name)) {
            if candidate.is_file() {
                return Ok(Self::new(candidate));
            }
        }
        which::which(name)
            .map(Self::new)
            .map_err(|e| SyncError::InvalidConfig {
                message: format!("Renderer \"{name}\" not found: {e}"),
            })
    }

    /// Path of the executable.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Renderer for ExternalRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, input: &Path, output: &Path) -> Result<(), SyncError> {
        let render_error = |message: String| SyncError::Render {
            path: output.display().to_string().into(),
            message,
        };

        debug!(program = %self.program.display(), input = %input.display(), output = %output.display(), "Rendering");
        let result = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .output()
            .map_err(|e| render_error(format!("Failed to run {}: {e}", self.name)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.name, result.status),
                reason => format!("{} exited with {}: {reason}", self.name, result.status),
            };
            return Err(render_error(message));
        }
        Ok(())
    }
}
