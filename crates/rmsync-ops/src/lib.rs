//! Sync execution engine for rmsync.
//!
//! This crate carries out a plan: it renders device documents onto the
//! mirror, uploads mirror files to the device and removes mirror items the
//! device deleted, with progress reporting via a broadcast channel.
//!
//! It also provides the collaborators the executor talks to: an SSH
//! transport, a local-directory transport and an external renderer.

mod executor;
mod operation;
mod progress;
mod render;
mod session;
mod transport;

pub use executor::{SyncExecutor, SyncState};
pub use operation::OperationError;
pub use progress::{ExecutionReport, SyncEvent, SyncProgress};
pub use render::{ExternalRenderer, Renderer};
pub use session::SyncSession;
pub use transport::{DirectoryTransport, SshTransport};

/// Default channel buffer size for sync progress events.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
