//! `Status` — the small tagged result type shared by the file-writer,
//! rotation-strategy, rotating-sink and async-sink-wrapper crates.
//!
//! This is deliberately *not* a `thiserror` enum: `Full` and `Empty` are
//! expected flow-control signals rather than error conditions (see
//! `is_full`/`is_empty`), and every variant carries the same shape of
//! optional human-readable context rather than a per-variant message
//! template. A hand-rolled sum type (the same shape as the C++ original's
//! `ulog::Status`, itself modeled on leveldb's `Status`) fits that better
//! than a derive macro.

use std::fmt;

/// The tag half of a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Ok,
    NotFound,
    Corruption,
    NotSupported,
    InvalidArgument,
    IoError,
    /// Not an error: the operation cannot make progress right now because a
    /// bounded resource (ring, file size cap) is exhausted.
    Full,
    /// Not an error: there was nothing to do.
    Empty,
}

impl StatusKind {
    const fn type_name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotFound => "NotFound",
            Self::Corruption => "Corruption",
            Self::NotSupported => "NotSupported",
            Self::InvalidArgument => "InvalidArgument",
            Self::IoError => "IOError",
            Self::Full => "Full",
            Self::Empty => "Empty",
        }
    }
}

/// A tagged status value carrying an optional message.
///
/// `Status::ok()` is the success value. Everything else is either an error
/// (`NotFound`, `Corruption`, `NotSupported`, `InvalidArgument`, `IOError`)
/// or a carrier signal used for flow control (`Full`, `Empty`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    kind: StatusKind,
    message: Option<String>,
}

impl Status {
    /// Returns a success status.
    #[must_use]
    pub const fn ok() -> Self {
        Self { kind: StatusKind::Ok, message: None }
    }

    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::NotFound, msg)
    }

    #[must_use]
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::Corruption, msg)
    }

    #[must_use]
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::NotSupported, msg)
    }

    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::InvalidArgument, msg)
    }

    #[must_use]
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::IoError, msg)
    }

    /// `Full` with no message — the common case on the hot path.
    #[must_use]
    pub const fn full() -> Self {
        Self { kind: StatusKind::Full, message: None }
    }

    #[must_use]
    pub fn full_msg(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::Full, msg)
    }

    /// `Empty` with no message — the common case on the hot path.
    #[must_use]
    pub const fn empty() -> Self {
        Self { kind: StatusKind::Empty, message: None }
    }

    #[must_use]
    pub fn empty_msg(msg: impl Into<String>) -> Self {
        Self::with_message(StatusKind::Empty, msg)
    }

    fn with_message(kind: StatusKind, msg: impl Into<String>) -> Self {
        Self { kind, message: Some(msg.into()) }
    }

    /// Appends a second message, composed as `msg: msg2` when displayed.
    #[must_use]
    pub fn with_context(mut self, msg2: impl Into<String>) -> Self {
        self.message = Some(match self.message.take() {
            Some(msg) => format!("{msg}: {}", msg2.into()),
            None => msg2.into(),
        });
        self
    }

    #[must_use]
    pub const fn kind(&self) -> StatusKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub const fn ok_bool(&self) -> bool {
        matches!(self.kind, StatusKind::Ok)
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        matches!(self.kind, StatusKind::Full)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.kind, StatusKind::Empty)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, StatusKind::NotFound)
    }

    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self.kind, StatusKind::Corruption)
    }

    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self.kind, StatusKind::IoError)
    }

    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, StatusKind::InvalidArgument)
    }

    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self.kind, StatusKind::NotSupported)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind.type_name()),
            None => write!(f, "{}", self.kind.type_name()),
        }
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

/// Allows `if status { .. }`-style truthiness checks, mirroring the C++
/// original's `explicit operator bool()`.
impl From<&Status> for bool {
    fn from(status: &Status) -> Self {
        status.ok_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_no_message() {
        let s = Status::ok();
        assert!(s.ok_bool());
        assert_eq!(s.to_string(), "OK");
    }

    #[test]
    fn display_composes_message() {
        let s = Status::corruption("bad header");
        assert_eq!(s.to_string(), "Corruption: bad header");
    }

    #[test]
    fn with_context_composes_msg_msg2() {
        let s = Status::io_error("open failed").with_context("/var/log/app.log");
        assert_eq!(s.to_string(), "IOError: open failed: /var/log/app.log");
    }

    #[test]
    fn full_and_empty_are_not_errors_by_convention_but_are_tagged() {
        assert!(Status::full().is_full());
        assert!(!Status::full().ok_bool());
        assert!(Status::empty().is_empty());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let status: Status = io_err.into();
        assert!(status.is_io_error());
    }
}
