//! Rotation strategies: policies for producing the next filename a
//! [`RotatingFileSink`](crate::sink::RotatingFileSink) should switch to when
//! its writer reports `Full`.

mod incremental;
mod rename;

pub use incremental::IncrementalRotationStrategy;
pub use rename::RenameRotationStrategy;

use std::path::PathBuf;

use ulog_status::Status;

/// How a full log file gets rotated out of the way. Implementations decide
/// both the naming scheme and the retention sweep.
pub trait RotationStrategy: Send {
    /// Performs the rotation (renaming or bumping counters as appropriate)
    /// and returns the path the sink should now open.
    fn rotate(&mut self) -> Status;

    /// The filename the sink should currently be writing to.
    fn latest_filename(&self) -> PathBuf;
}

/// Removes `path` if it exists, ignoring a `NotFound` condition. Shared by
/// both strategies' retention sweeps.
pub(crate) fn remove_if_present(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
