//! File writers (buffered, unbuffered, zstd-compressing), the two rotation
//! strategies (rename-chain and monotonic-index), and the rotating file
//! sink that composes a writer with a strategy.

mod buffered;
mod path;
mod rotation;
mod sink;
#[cfg(unix)]
mod unbuffered;
mod writer;
mod zstd_writer;

pub use buffered::BufferedFileWriter;
pub use path::split_by_extension;
pub use rotation::{IncrementalRotationStrategy, RenameRotationStrategy, RotationStrategy};
pub use sink::{HeaderCallback, RotatingFileSink, RotatingFileSinkConfig, RotationKind};
#[cfg(unix)]
pub use unbuffered::UnbufferedFileWriter;
pub use writer::{Writer, NO_LIMIT};
pub use zstd_writer::{ZstdConfig, ZstdWriter, DEFAULT_MAX_FRAME_IN};
