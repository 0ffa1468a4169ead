//! Raw `open(2)`/`write(2)` writer, bypassing libc stdio buffering.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use ulog_status::Status;

use crate::path::create_dir_recursive;
use crate::writer::{Writer, NO_LIMIT};

/// A raw writer backed directly by a unix file descriptor. Avoids the libc
/// stdio buffer that `BufferedFileWriter` accepts, at the cost of a syscall
/// per write.
pub struct UnbufferedFileWriter {
    fd: Option<i32>,
    written: u64,
    limit: u64,
}

impl Default for UnbufferedFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnbufferedFileWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { fd: None, written: 0, limit: NO_LIMIT }
    }

    fn close_fd(&mut self) {
        if let Some(fd) = self.fd.take() {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

impl Writer for UnbufferedFileWriter {
    fn open(&mut self, path: &Path, truncate: bool, limit: u64) -> Status {
        if self.fd.is_some() {
            return Status::corruption("writer is already open");
        }
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_recursive(parent) {
                return Status::io_error(e.to_string());
            }
        }

        let cpath = match CString::new(path.as_os_str().as_bytes()) {
            Ok(c) => c,
            Err(_) => return Status::invalid_argument("path contains an interior NUL byte"),
        };

        let mut flags = libc::O_WRONLY | libc::O_CREAT;
        flags |= if truncate { libc::O_TRUNC } else { libc::O_APPEND };

        let fd = unsafe { libc::open(cpath.as_ptr(), flags, 0o644) };
        if fd < 0 {
            return Status::io_error(std::io::Error::last_os_error().to_string());
        }

        let written = if truncate {
            0
        } else {
            let offset = unsafe { libc::lseek(fd, 0, libc::SEEK_END) };
            if offset < 0 {
                unsafe {
                    libc::close(fd);
                }
                return Status::io_error(std::io::Error::last_os_error().to_string());
            }
            offset as u64
        };

        self.fd = Some(fd);
        self.written = written;
        self.limit = limit;
        Status::ok()
    }

    fn write(&mut self, data: &[u8]) -> Status {
        let Some(fd) = self.fd else {
            return Status::corruption("writer is not open");
        };
        if self.written + data.len() as u64 > self.limit {
            return Status::full();
        }

        let mut remaining = data;
        while !remaining.is_empty() {
            let n = unsafe {
                libc::write(fd, remaining.as_ptr().cast(), remaining.len())
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Status::io_error(err.to_string());
            }
            remaining = &remaining[n as usize..];
        }

        self.written += data.len() as u64;
        Status::ok()
    }

    fn flush(&mut self) -> Status {
        let Some(fd) = self.fd else {
            return Status::corruption("writer is not open");
        };
        let rc = unsafe { libc::fsync(fd) };
        if rc != 0 {
            return Status::io_error(std::io::Error::last_os_error().to_string());
        }
        Status::ok()
    }

    fn close(&mut self) -> Status {
        let status = if self.fd.is_some() { self.flush() } else { Status::ok() };
        self.close_fd();
        status
    }

    fn tell(&self) -> u64 {
        self.written
    }
}

impl Drop for UnbufferedFileWriter {
    fn drop(&mut self) {
        self.close_fd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_reports_full_allowing_equality_at_the_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = UnbufferedFileWriter::new();
        assert!(writer.open(&path, true, 10).ok_bool());

        assert!(writer.write(b"0123456789").ok_bool());
        assert!(writer.write(b"x").is_full());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
    }

    #[test]
    fn append_mode_continues_from_existing_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"12345").unwrap();

        let mut writer = UnbufferedFileWriter::new();
        writer.open(&path, false, NO_LIMIT);
        assert_eq!(writer.tell(), 5);
        assert!(writer.write(b"678").ok_bool());
        assert_eq!(std::fs::read(&path).unwrap(), b"12345678");
    }
}
