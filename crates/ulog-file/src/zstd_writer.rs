//! Streaming zstd-compressing writer, framing output so that no single
//! output file ever holds more than `max_frame_in` bytes of *uncompressed*
//! input, each frame independently decompressible.

use std::path::Path;

use ulog_status::Status;
use zstd_safe::{CCtx, InBuffer, OutBuffer};

use crate::buffered::BufferedFileWriter;
use crate::writer::{Writer, NO_LIMIT};

/// Conservative allowance added on top of `compress_bound` to account for
/// zstd frame/block headers when deciding whether a write would overflow
/// the configured limit. Chosen generously; a few wasted bytes of headroom
/// is cheaper than a writer that has to unwind a partially emitted frame.
const HEADER_OVERHEAD: usize = 64;

/// Default uncompressed-bytes-per-frame ceiling: 8 MiB.
pub const DEFAULT_MAX_FRAME_IN: u64 = 8 << 20;

#[derive(Debug, Clone)]
pub struct ZstdConfig {
    pub level: i32,
    pub window_log: Option<i32>,
    pub chain_log: Option<i32>,
    pub hash_log: Option<i32>,
    pub search_log: Option<i32>,
    pub min_match: Option<i32>,
    pub target_length: Option<i32>,
    pub strategy: Option<zstd_safe::Strategy>,
    pub max_frame_in: u64,
}

impl Default for ZstdConfig {
    fn default() -> Self {
        Self {
            level: zstd_safe::CCtx::default_compression_level(),
            window_log: None,
            chain_log: None,
            hash_log: None,
            search_log: None,
            min_match: None,
            target_length: None,
            strategy: None,
            max_frame_in: DEFAULT_MAX_FRAME_IN,
        }
    }
}

impl ZstdConfig {
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self { level, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_frame_in(mut self, max_frame_in: u64) -> Self {
        self.max_frame_in = max_frame_in;
        self
    }
}

/// A writer that streams zstd-compressed frames to an underlying
/// [`BufferedFileWriter`], starting a fresh frame whenever the running
/// uncompressed input for the current frame would exceed
/// [`ZstdConfig::max_frame_in`].
pub struct ZstdWriter {
    cctx: CCtx<'static>,
    config: ZstdConfig,
    inner: BufferedFileWriter,
    frame_in: u64,
    frame_open: bool,
    limit: u64,
}

impl ZstdWriter {
    #[must_use]
    pub fn new(config: ZstdConfig) -> Self {
        let mut cctx = CCtx::create();
        let _ = cctx.set_parameter(zstd_safe::CParameter::CompressionLevel(config.level));
        if let Some(v) = config.window_log {
            let _ = cctx.set_parameter(zstd_safe::CParameter::WindowLog(v as u32));
        }
        if let Some(v) = config.chain_log {
            let _ = cctx.set_parameter(zstd_safe::CParameter::ChainLog(v as u32));
        }
        if let Some(v) = config.hash_log {
            let _ = cctx.set_parameter(zstd_safe::CParameter::HashLog(v as u32));
        }
        if let Some(v) = config.search_log {
            let _ = cctx.set_parameter(zstd_safe::CParameter::SearchLog(v as u32));
        }
        if let Some(v) = config.min_match {
            let _ = cctx.set_parameter(zstd_safe::CParameter::MinMatch(v));
        }
        if let Some(v) = config.target_length {
            let _ = cctx.set_parameter(zstd_safe::CParameter::TargetLength(v as u32));
        }
        if let Some(v) = config.strategy {
            let _ = cctx.set_parameter(zstd_safe::CParameter::Strategy(v));
        }

        Self {
            cctx,
            config,
            inner: BufferedFileWriter::new(),
            frame_in: 0,
            frame_open: false,
            limit: NO_LIMIT,
        }
    }

    fn end_frame(&mut self) -> Status {
        if !self.frame_open {
            return Status::ok();
        }
        let mut out_buf = vec![0u8; zstd_safe::compress_bound(0) + HEADER_OVERHEAD];
        loop {
            let mut out = OutBuffer::around(&mut out_buf);
            let mut input = InBuffer::around(&[] as &[u8]);
            let remaining = match self.cctx.compress_stream2(
                &mut out,
                &mut input,
                zstd_safe::EndDirective::End,
            ) {
                Ok(r) => r,
                Err(code) => {
                    return Status::io_error(format!("zstd end-frame failed: {code}"))
                }
            };
            let produced = out.as_slice().to_vec();
            if !produced.is_empty() {
                let status = self.inner.write(&produced);
                if !status.ok_bool() {
                    return status;
                }
            }
            if remaining == 0 {
                break;
            }
        }
        let _ = self.cctx.reset(zstd_safe::ResetDirective::SessionOnly);
        self.frame_open = false;
        self.frame_in = 0;
        Status::ok()
    }
}

impl Writer for ZstdWriter {
    fn open(&mut self, path: &Path, truncate: bool, limit: u64) -> Status {
        self.frame_in = 0;
        self.frame_open = false;
        self.limit = limit;
        let _ = self.cctx.reset(zstd_safe::ResetDirective::SessionOnly);
        // The inner writer is given no size cap of its own: ZstdWriter
        // performs the Full admission check itself against the
        // uncompressed-size-aware bound below, before any bytes are
        // compressed, and only ever tracks its own `limit`.
        self.inner.open(path, truncate, NO_LIMIT)
    }

    fn write(&mut self, data: &[u8]) -> Status {
        if data.is_empty() {
            return Status::ok();
        }

        // Conservative admission check against the compressed-size budget,
        // before we spend any CPU compressing.
        let bound = zstd_safe::compress_bound(data.len()) + HEADER_OVERHEAD;
        if self.inner.tell() + bound as u64 > self.limit {
            return Status::full();
        }

        let mut offset = 0usize;
        while offset < data.len() {
            let remaining_in_frame =
                (self.config.max_frame_in.saturating_sub(self.frame_in)) as usize;
            if remaining_in_frame == 0 {
                let status = self.end_frame();
                if !status.ok_bool() {
                    return status;
                }
                continue;
            }

            let take = remaining_in_frame.min(data.len() - offset);
            let chunk = &data[offset..offset + take];

            let directive = if self.frame_in as usize + take >= self.config.max_frame_in as usize
            {
                zstd_safe::EndDirective::End
            } else {
                zstd_safe::EndDirective::Continue
            };

            let mut input = InBuffer::around(chunk);
            let mut out_buf = vec![0u8; zstd_safe::compress_bound(take) + HEADER_OVERHEAD];
            loop {
                let mut out = OutBuffer::around(&mut out_buf);
                let remaining = match self.cctx.compress_stream2(&mut out, &mut input, directive) {
                    Ok(r) => r,
                    Err(code) => {
                        return Status::io_error(format!("zstd compression failed: {code}"))
                    }
                };
                let produced = out.as_slice().to_vec();
                if !produced.is_empty() {
                    let status = self.inner.write(&produced);
                    if !status.ok_bool() {
                        return status;
                    }
                }
                self.frame_open = true;
                if input.pos == chunk.len() && remaining == 0 {
                    break;
                }
            }

            self.frame_in += take as u64;
            offset += take;

            if matches!(directive, zstd_safe::EndDirective::End) {
                let _ = self.cctx.reset(zstd_safe::ResetDirective::SessionOnly);
                self.frame_open = false;
                self.frame_in = 0;
            }
        }

        Status::ok()
    }

    fn flush(&mut self) -> Status {
        let status = self.end_frame();
        if !status.ok_bool() {
            return status;
        }
        self.inner.flush()
    }

    fn close(&mut self) -> Status {
        let status = self.end_frame();
        if !status.ok_bool() {
            return status;
        }
        self.inner.close()
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_zstd_decoder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log.zst");

        let mut writer = ZstdWriter::new(ZstdConfig::new(3));
        assert!(writer.open(&path, true, NO_LIMIT).ok_bool());
        assert!(writer.write(b"hello world, this is compressible text text text").ok_bool());
        assert!(writer.close().ok_bool());

        let compressed = std::fs::read(&path).unwrap();
        let decoded = zstd::decode_all(compressed.as_slice()).unwrap();
        assert_eq!(decoded, b"hello world, this is compressible text text text");
    }

    #[test]
    fn flush_ends_the_open_frame_leaving_a_partial_frame_decodable() {
        // max_frame_in = 1024: 4096 bytes of the repeated pattern "abcdefgh"
        // fills four complete frames, and a flush() after that closes no
        // further frame (frame_in == 0); feeding one more partial chunk and
        // flushing yields a fifth, partial frame.
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log.zst");

        let mut writer = ZstdWriter::new(ZstdConfig::new(1).with_max_frame_in(1024));
        assert!(writer.open(&path, true, NO_LIMIT).ok_bool());

        let pattern: Vec<u8> = b"abcdefgh".iter().cycle().take(4096).copied().collect();
        assert!(writer.write(&pattern).ok_bool());
        assert!(writer.flush().ok_bool());

        let extra: Vec<u8> = b"abcdefgh".iter().cycle().take(512).copied().collect();
        assert!(writer.write(&extra).ok_bool());
        assert!(writer.flush().ok_bool());
        assert!(writer.close().ok_bool());

        let compressed = std::fs::read(&path).unwrap();
        let mut decoder = zstd::stream::read::Decoder::new(compressed.as_slice()).unwrap();
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();

        let mut expected = pattern;
        expected.extend(extra);
        assert_eq!(out, expected);
    }

    #[test]
    fn large_input_is_split_across_multiple_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log.zst");

        let mut writer = ZstdWriter::new(ZstdConfig::new(1).with_max_frame_in(1024));
        assert!(writer.open(&path, true, NO_LIMIT).ok_bool());
        let payload = vec![b'x'; 4096];
        assert!(writer.write(&payload).ok_bool());
        assert!(writer.close().ok_bool());

        let compressed = std::fs::read(&path).unwrap();
        // Each independent frame can be decoded on its own; concatenating
        // all decoded frames must reconstruct the original input exactly.
        let mut decoder = zstd::stream::read::Decoder::new(compressed.as_slice()).unwrap();
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, payload);
    }
}
