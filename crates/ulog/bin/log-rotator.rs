//! `log-rotator`: reads bytes from standard input and forwards them to an
//! async rotating file sink, exiting cleanly on EOF. An informative demo of
//! the pipeline's consumer side (§6 of the design notes) — not a hardened
//! CLI in its own right; argument parsing is `clap`'s derive macro doing
//! the validation work, not custom logic.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ulog::{
    AsyncSinkWrapper, BufferedFileWriter, RotatingFileSink, RotatingFileSinkConfig, RotationKind,
    Sink, SinkConfig, ZstdConfig, ZstdWriter,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RotationArg {
    Rename,
    Incremental,
}

#[derive(Parser, Debug)]
#[command(name = "log-rotator", about = "Forward stdin into a rotating, optionally zstd-compressed log file")]
struct Args {
    /// Destination log file path.
    #[arg(long)]
    file: PathBuf,

    /// Per-file size cap, e.g. "10M", "512K", "1G". Unbounded if omitted.
    #[arg(long, value_parser = parse_size)]
    size_limit: Option<u64>,

    /// Maximum number of rotated files to retain.
    #[arg(long, default_value_t = 8)]
    max_files: u32,

    /// Flush interval, e.g. "500ms", "3s", "1min", "1hour".
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    flush_interval: Duration,

    /// Rotation layout.
    #[arg(long, value_enum, default_value_t = RotationArg::Rename)]
    strategy: RotationArg,

    /// Rotate once before the first write, rather than appending to
    /// whatever `latest_filename()` already names.
    #[arg(long, default_value_t = false)]
    rotate_on_open: bool,

    /// Packet ring capacity in bytes (rounded up to a power of two).
    #[arg(long, default_value_t = 64 * 1024)]
    fifo_size: usize,

    /// Compress the output with zstd instead of writing raw bytes.
    #[arg(long, default_value_t = false)]
    zstd: bool,

    /// Comma-separated zstd parameters, e.g.
    /// "level=9,windowLog=24,maxFrameIn=8388608".
    #[arg(long)]
    zstd_params: Option<String>,
}

fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, mult) = match s.chars().last() {
        Some('K' | 'k') => (&s[..s.len() - 1], 1u64 << 10),
        Some('M' | 'm') => (&s[..s.len() - 1], 1u64 << 20),
        Some('G' | 'g') => (&s[..s.len() - 1], 1u64 << 30),
        _ => (s, 1),
    };
    digits
        .parse::<u64>()
        .map(|n| n * mult)
        .map_err(|e| format!("invalid size {s:?}: {e}"))
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    for (suffix, to_duration) in [
        ("ms", (|n: u64| Duration::from_millis(n)) as fn(u64) -> Duration),
        ("min", |n| Duration::from_secs(n * 60)),
        ("hour", |n| Duration::from_secs(n * 3600)),
        ("s", |n| Duration::from_secs(n)),
    ] {
        if let Some(digits) = s.strip_suffix(suffix) {
            return digits
                .parse::<u64>()
                .map(to_duration)
                .map_err(|e| format!("invalid duration {s:?}: {e}"));
        }
    }
    Err(format!("unrecognized duration suffix in {s:?} (expected ms/s/min/hour)"))
}

fn parse_zstd_params(raw: &str) -> ZstdConfig {
    let mut config = ZstdConfig::default();
    for kv in raw.split(',') {
        let Some((k, v)) = kv.split_once('=') else { continue };
        let Ok(n) = v.trim().parse::<i64>() else { continue };
        match k.trim() {
            "level" => config.level = n as i32,
            "windowLog" => config.window_log = Some(n as i32),
            "chainLog" => config.chain_log = Some(n as i32),
            "hashLog" => config.hash_log = Some(n as i32),
            "searchLog" => config.search_log = Some(n as i32),
            "minMatch" => config.min_match = Some(n as i32),
            "targetLength" => config.target_length = Some(n as i32),
            "maxFrameIn" => config.max_frame_in = n as u64,
            other => tracing::warn!(param = other, "ignoring unrecognized zstd parameter"),
        }
    }
    config
}

fn build_sink_config(args: &Args) -> RotatingFileSinkConfig {
    let mut config = RotatingFileSinkConfig::new(&args.file)
        .with_max_files(args.max_files)
        .with_rotate_on_open(args.rotate_on_open)
        .with_rotation(match args.strategy {
            RotationArg::Rename => RotationKind::Rename,
            RotationArg::Incremental => RotationKind::Incremental,
        });
    if let Some(limit) = args.size_limit {
        config = config.with_file_size(limit);
    }
    config
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let sink_config = build_sink_config(&args);

    let sink: Box<dyn Sink> = if args.zstd {
        let zstd_config = args
            .zstd_params
            .as_deref()
            .map_or_else(ZstdConfig::default, parse_zstd_params);
        Box::new(RotatingFileSink::new(ZstdWriter::new(zstd_config), sink_config, None))
    } else {
        Box::new(RotatingFileSink::new(BufferedFileWriter::new(), sink_config, None))
    };

    let wrapper = AsyncSinkWrapper::new(
        SinkConfig::new(args.fifo_size).with_max_flush_period(args.flush_interval),
        vec![sink],
    );

    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let status = wrapper.sink_it_timeout(&line, Duration::from_secs(5));
                if !status.ok_bool() {
                    tracing::error!(%status, "dropped a record: sink could not accept it in time");
                }
            }
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                std::process::exit(1);
            }
        }
    }

    let _ = wrapper.flush(Duration::from_secs(5));
}
