//! Console messages mirrored as desktop notifications.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

const TITLE: &str = "Synchronizing reMarkable";

/// Notification urgency, as understood by `notify-send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

impl Urgency {
    fn as_str(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// Prints progress messages and, when `notify-send` is installed, keeps one
/// desktop notification up to date with the latest of them.
#[derive(Debug, Default)]
pub struct Notifier {
    program: Option<PathBuf>,
    id: Option<u32>,
}

impl Notifier {
    /// Notify through `notify-send` if it is on `PATH` and `enabled`.
    pub fn new(enabled: bool) -> Self {
        let program = enabled.then(|| which::which("notify-send").ok()).flatten();
        Self { program, id: None }
    }

    /// Print a message and show it as a notification.
    pub fn log(&mut self, text: &str) {
        println!("{text}");
        self.notify(text, Urgency::Normal);
    }

    /// Show a message as a notification only.
    pub fn notify(&mut self, text: &str, urgency: Urgency) {
        let Some(program) = &self.program else {
            return;
        };

        let mut cmd = Command::new(program);
        cmd.arg("--print-id")
            .arg("--app-name=rmsync")
            .arg(format!("--urgency={}", urgency.as_str()))
            .arg("--icon=input-tablet");
        if let Some(id) = self.id {
            cmd.arg(format!("--replace-id={id}"));
        }
        cmd.arg(TITLE).arg(text);

        match cmd.output() {
            Ok(output) if output.status.success() => {
                self.id = String::from_utf8_lossy(&output.stdout).trim().parse().ok();
            }
            Ok(output) => debug!(status = %output.status, "notify-send failed"),
            Err(e) => debug!("notify-send failed: {e}"),
        }
    }
}
