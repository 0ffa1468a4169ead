use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use ulog_status::Status;

use crate::path::create_dir_recursive;
use crate::writer::{Writer, NO_LIMIT};

/// A raw writer backed by a buffered `std::fs::File`.
#[derive(Default)]
pub struct BufferedFileWriter {
    inner: Option<BufWriter<std::fs::File>>,
    written: u64,
    limit: u64,
}

impl BufferedFileWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: None, written: 0, limit: NO_LIMIT }
    }
}

impl Writer for BufferedFileWriter {
    fn open(&mut self, path: &Path, truncate: bool, limit: u64) -> Status {
        if self.inner.is_some() {
            return Status::corruption("writer is already open");
        }
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_recursive(parent) {
                return Status::io_error(e.to_string());
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if truncate {
            options.truncate(true);
        } else {
            options.append(true);
        }

        let file = match options.open(path) {
            Ok(f) => f,
            Err(e) => return Status::io_error(e.to_string()),
        };

        let written = if truncate {
            0
        } else {
            file.metadata().map(|m| m.len()).unwrap_or(0)
        };

        self.inner = Some(BufWriter::new(file));
        self.written = written;
        self.limit = limit;
        Status::ok()
    }

    fn write(&mut self, data: &[u8]) -> Status {
        let Some(file) = self.inner.as_mut() else {
            return Status::corruption("writer is not open");
        };
        if self.written + data.len() as u64 > self.limit {
            return Status::full();
        }
        match file.write_all(data) {
            Ok(()) => {
                self.written += data.len() as u64;
                Status::ok()
            }
            Err(e) => Status::io_error(e.to_string()),
        }
    }

    fn flush(&mut self) -> Status {
        let Some(file) = self.inner.as_mut() else {
            return Status::corruption("writer is not open");
        };
        match file.flush() {
            Ok(()) => Status::ok(),
            Err(e) => Status::io_error(e.to_string()),
        }
    }

    fn close(&mut self) -> Status {
        let status = self.flush();
        self.inner = None;
        status
    }

    fn tell(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_reports_full_before_exceeding_limit_allowing_equality() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = BufferedFileWriter::new();
        assert!(writer.open(&path, true, 10).ok_bool());

        assert!(writer.write(b"0123456789").ok_bool()); // exactly at the limit
        assert!(writer.write(b"x").is_full());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
    }

    #[test]
    fn non_truncating_open_picks_up_existing_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"12345").unwrap();

        let mut writer = BufferedFileWriter::new();
        writer.open(&path, false, NO_LIMIT);
        assert_eq!(writer.tell(), 5);
    }
}
