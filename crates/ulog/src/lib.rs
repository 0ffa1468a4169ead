//! Facade crate tying together the asynchronous packet-based logging
//! pipeline: [`ulog_ring`] (the lock-free MPSC packet ring), [`ulog_sink`]
//! (the drain-thread sink wrapper), and [`ulog_file`] (rotating file sinks
//! and their writers), with [`ulog_status::Status`] as the shared result
//! type running through all three.
//!
//! This crate adds nothing of its own beyond re-exports and the
//! `log-rotator` demo binary (`bin/log-rotator.rs`) — the real
//! implementation lives in the member crates, matching the way the teacher
//! workspace's own root crate wires up `ringmpsc`/`ringmpsc-stream`.

pub use ulog_file::{
    BufferedFileWriter, HeaderCallback, IncrementalRotationStrategy, RenameRotationStrategy,
    RotatingFileSink, RotatingFileSinkConfig, RotationKind, RotationStrategy, Writer, ZstdConfig,
    ZstdWriter, DEFAULT_MAX_FRAME_IN, NO_LIMIT,
};
#[cfg(unix)]
pub use ulog_file::UnbufferedFileWriter;
pub use ulog_ring::{channel, channel_with_config, Batch, Consumer, Notifier, Producer, Reservation, RingConfig};
pub use ulog_sink::{AsyncSinkWrapper, Sink, SinkConfig};
pub use ulog_status::{Status, StatusKind};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn facade_wires_a_rotating_file_sink_through_the_async_wrapper() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");

        let file_sink = RotatingFileSink::new(
            BufferedFileWriter::new(),
            RotatingFileSinkConfig::new(&path).with_file_size(64).with_max_files(2),
            None,
        );

        let wrapper = AsyncSinkWrapper::new(SinkConfig::new(4096), vec![Box::new(file_sink)]);
        assert!(wrapper.sink_it(b"hello from ulog").ok_bool());
        assert!(wrapper.flush(Duration::from_secs(1)).ok_bool());

        assert_eq!(std::fs::read(&path).unwrap(), b"hello from ulog");
    }
}
