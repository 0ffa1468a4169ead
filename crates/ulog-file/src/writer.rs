use std::path::Path;

use ulog_status::Status;

/// No size limit: a writer configured with this never reports `Full`.
pub const NO_LIMIT: u64 = u64::MAX;

/// Common contract for every file writer: raw buffered, raw unbuffered, and
/// zstd-compressing. A writer tracks its own `written`/`tell` position and
/// reports `Full` (not `IOError`) once a `write` would exceed its limit.
pub trait Writer: Send {
    /// Opens `path`. `truncate` selects truncate-on-open vs. append;
    /// `limit` is the hard size cap (`NO_LIMIT` for unbounded). Creates the
    /// containing directory recursively. Fails with `Corruption` if this
    /// writer instance is already open.
    fn open(&mut self, path: &Path, truncate: bool, limit: u64) -> Status;

    /// Writes all of `data`, or none of it. Returns `Full` without writing
    /// anything if this write would exceed the configured limit.
    fn write(&mut self, data: &[u8]) -> Status;

    fn flush(&mut self) -> Status;

    fn close(&mut self) -> Status;

    /// Bytes written so far (including any pre-existing file size picked up
    /// on non-truncating open).
    fn tell(&self) -> u64;
}
