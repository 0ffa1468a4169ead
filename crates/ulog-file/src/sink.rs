//! Rotating file sink: composes a [`Writer`] with a [`RotationStrategy`],
//! rotating and retrying once on `Full`, with an optional file-header
//! callback re-emitted after every (re)open.
//!
//! Ported from `sink_rotating_file.h`.

use std::path::PathBuf;

use ulog_sink::Sink;
use ulog_status::Status;

use crate::path::split_by_extension;
use crate::rotation::{IncrementalRotationStrategy, RenameRotationStrategy, RotationStrategy};
use crate::writer::{Writer, NO_LIMIT};

/// Which on-disk layout a [`RotatingFileSink`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationKind {
    /// `basename.ext`, `basename.1.ext`, `basename.2.ext`, …
    Rename,
    /// `basename-N.ext` with a `.latest` sidecar persisting `N`.
    Incremental,
}

/// Configuration for a [`RotatingFileSink`], following the `Config`-struct
/// convention used throughout this workspace.
#[derive(Debug, Clone)]
pub struct RotatingFileSinkConfig {
    pub(crate) path: PathBuf,
    pub(crate) file_size: u64,
    pub(crate) max_files: u32,
    pub(crate) rotation: RotationKind,
    pub(crate) rotate_on_open: bool,
}

impl RotatingFileSinkConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_size: NO_LIMIT,
            max_files: 8,
            rotation: RotationKind::Rename,
            rotate_on_open: false,
        }
    }

    #[must_use]
    pub const fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    #[must_use]
    pub const fn with_max_files(mut self, max_files: u32) -> Self {
        self.max_files = max_files;
        self
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: RotationKind) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub const fn with_rotate_on_open(mut self, rotate_on_open: bool) -> Self {
        self.rotate_on_open = rotate_on_open;
        self
    }
}

/// Produces the bytes to write immediately after a (re)open, e.g. a CSV
/// header line. Invoked once at construction and again after every
/// rotation.
pub type HeaderCallback = Box<dyn FnMut() -> Vec<u8> + Send>;

/// Composes a [`Writer`] with a [`RotationStrategy`]: on `Full` it closes
/// the writer, rotates, reopens truncated on the new `latest_filename()`,
/// re-emits the header, and retries the write once.
pub struct RotatingFileSink<W: Writer> {
    writer: W,
    strategy: Box<dyn RotationStrategy>,
    file_size: u64,
    header_callback: Option<HeaderCallback>,
    opened: bool,
}

impl<W: Writer> RotatingFileSink<W> {
    /// Builds the sink: splits the filename, constructs the configured
    /// rotation strategy, optionally rotates once before the first open,
    /// opens the writer, and emits the header if one is configured.
    ///
    /// Construction never panics on a failed open or header write — it
    /// logs and leaves the sink in the best-effort state the failure left
    /// it in, matching the original's `ULOG_ERROR`-and-continue behavior.
    /// A sink left unopened this way surfaces `Corruption` from every
    /// subsequent `sink_it` call.
    pub fn new(mut writer: W, config: RotatingFileSinkConfig, header_callback: Option<HeaderCallback>) -> Self {
        let (basename, ext) = split_by_extension(&config.path);

        let mut strategy: Box<dyn RotationStrategy> = match config.rotation {
            RotationKind::Rename => {
                Box::new(RenameRotationStrategy::new(basename, ext, config.max_files))
            }
            RotationKind::Incremental => {
                Box::new(IncrementalRotationStrategy::new(basename, ext, config.max_files))
            }
        };

        if config.rotate_on_open {
            let status = strategy.rotate();
            if !status.ok_bool() {
                tracing::error!(%status, "rotate-on-open failed");
            }
        }

        let mut sink = Self {
            writer,
            strategy,
            file_size: config.file_size,
            header_callback,
            opened: false,
        };

        let open_status = sink.open_and_emit_header(config.rotate_on_open);
        if !open_status.ok_bool() {
            tracing::error!(status = %open_status, "rotating file sink failed to open on construction");
        }

        sink
    }

    fn open_and_emit_header(&mut self, truncate: bool) -> Status {
        let path = self.strategy.latest_filename();
        let status = self.writer.open(&path, truncate, self.file_size);
        if !status.ok_bool() {
            self.opened = false;
            return status;
        }
        self.opened = true;

        if let Some(cb) = self.header_callback.as_mut() {
            let header = cb();
            if !header.is_empty() {
                let status = self.writer.write(&header);
                if !status.ok_bool() {
                    tracing::error!(%status, "failed to write file header after open");
                    return status;
                }
            }
        }
        Status::ok()
    }

    fn rotate_and_reopen(&mut self) -> Status {
        let close_status = self.writer.close();
        if !close_status.ok_bool() {
            tracing::error!(status = %close_status, "error closing writer before rotation");
        }
        self.opened = false;

        let rotate_status = self.strategy.rotate();
        if !rotate_status.ok_bool() {
            return rotate_status;
        }

        self.open_and_emit_header(true)
    }
}

impl<W: Writer> Sink for RotatingFileSink<W> {
    fn sink_it(&mut self, data: &[u8]) -> Status {
        if !self.opened {
            return Status::corruption("rotating file sink has no open writer");
        }

        let status = self.writer.write(data);
        if !status.is_full() {
            return status;
        }

        let rotate_status = self.rotate_and_reopen();
        if !rotate_status.ok_bool() {
            return rotate_status;
        }

        // Retry exactly once; a second `Full` means the record itself
        // cannot fit in a freshly rotated, empty file and is surfaced to
        // the caller rather than looping forever.
        self.writer.write(data)
    }

    fn flush(&mut self) -> Status {
        if !self.opened {
            return Status::corruption("rotating file sink has no open writer");
        }
        self.writer.flush()
    }
}
