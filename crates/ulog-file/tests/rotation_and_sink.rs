//! End-to-end scenarios spanning a writer, a rotation strategy and the
//! rotating sink that composes them.
//!
//! Uses `UnbufferedFileWriter`, which is unix-only (direct fd I/O via
//! `libc`); this file is skipped entirely on other platforms.
#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use ulog_file::{
    HeaderCallback, IncrementalRotationStrategy, RotatingFileSink, RotatingFileSinkConfig,
    RotationKind, RotationStrategy, UnbufferedFileWriter, ZstdConfig, ZstdWriter,
};
use ulog_sink::Sink;

#[test]
fn incremental_rotation_survives_a_restart() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("svc");

    {
        let mut strategy = IncrementalRotationStrategy::new(base.clone(), ".log".into(), 100);
        for _ in 0..5 {
            strategy.rotate();
        }
        assert_eq!(strategy.latest_filename().file_name().unwrap(), "svc-5.log");
    }

    // A fresh strategy instance over the same basename picks up where the
    // prior one left off via the sidecar, without the sink itself being
    // destroyed and recreated.
    let mut resumed = IncrementalRotationStrategy::new(base, ".log".into(), 100);
    resumed.rotate();
    assert_eq!(resumed.latest_filename().file_name().unwrap(), "svc-6.log");
}

#[test]
fn unbuffered_writer_through_rename_rotation_rotates_on_full() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("svc.log");
    let config = RotatingFileSinkConfig::new(&path)
        .with_file_size(32)
        .with_max_files(4)
        .with_rotation(RotationKind::Rename);

    let mut sink = RotatingFileSink::new(UnbufferedFileWriter::new(), config, None);

    for _ in 0..8 {
        assert!(sink.sink_it(b"0123456789ABCDEF").ok_bool()); // 16 bytes, 2 per file
    }
    sink.flush();

    assert!(dir.path().join("svc.1.log").exists());
    assert_eq!(std::fs::metadata(dir.path().join("svc.1.log")).unwrap().len(), 32);
}

#[test]
fn zstd_framing_produces_one_frame_per_max_frame_in_chunk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("svc.log.zst");

    let mut writer = ZstdWriter::new(ZstdConfig::new(1).with_max_frame_in(1024));
    let pattern: Vec<u8> = b"abcdefgh".iter().cycle().take(4096).copied().collect();

    use ulog_file::Writer as _;
    assert!(writer.open(&path, true, ulog_file::NO_LIMIT).ok_bool());
    assert!(writer.write(&pattern).ok_bool());
    assert!(writer.flush().ok_bool());
    assert!(writer.close().ok_bool());

    let compressed = std::fs::read(&path).unwrap();
    let mut cursor = compressed.as_slice();
    let mut frames = 0;
    let mut decoded = Vec::new();
    while !cursor.is_empty() {
        let mut decoder = zstd::stream::read::Decoder::new(&mut cursor).unwrap();
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        decoded.extend_from_slice(&out);
        frames += 1;
    }

    assert_eq!(frames, 4, "4096 bytes in 1024-byte frames is exactly 4 full frames");
    assert_eq!(decoded, pattern);
}

#[test]
fn drop_on_full_sink_is_removed_from_an_async_wrapper_chain() {
    struct AlwaysFullSink;
    impl Sink for AlwaysFullSink {
        fn sink_it(&mut self, _data: &[u8]) -> ulog_status::Status {
            ulog_status::Status::full()
        }
        fn flush(&mut self) -> ulog_status::Status {
            ulog_status::Status::ok()
        }
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("svc.log");
    let config = RotatingFileSinkConfig::new(&path).with_max_files(3);
    let file_sink = RotatingFileSink::new(UnbufferedFileWriter::new(), config, None);

    let wrapper = ulog_sink::AsyncSinkWrapper::new(
        ulog_sink::SinkConfig::new(4096),
        vec![Box::new(AlwaysFullSink), Box::new(file_sink)],
    );

    for _ in 0..5 {
        assert!(wrapper.sink_it(b"hello").ok_bool());
    }
    assert!(wrapper.flush(std::time::Duration::from_secs(1)).ok_bool());

    assert_eq!(std::fs::read(&path).unwrap(), b"hello".repeat(5));
}

#[test]
fn header_callback_count_matches_number_of_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("svc.log");
    let config = RotatingFileSinkConfig::new(&path)
        .with_file_size(10)
        .with_max_files(4)
        .with_rotation(RotationKind::Incremental);

    let opens = Arc::new(AtomicUsize::new(0));
    let counter = opens.clone();
    let header: HeaderCallback = Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    });

    let mut sink = RotatingFileSink::new(UnbufferedFileWriter::new(), config, Some(header));
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        sink.sink_it(b"0123456789");
    }
    assert_eq!(opens.load(Ordering::SeqCst), 3);
}
