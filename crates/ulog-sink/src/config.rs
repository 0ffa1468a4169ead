use std::time::Duration;

/// Configuration for an [`AsyncSinkWrapper`](crate::AsyncSinkWrapper),
/// following the `Config`-struct convention used throughout this workspace.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub(crate) fifo_capacity: usize,
    pub(crate) max_flush_period: Duration,
    pub(crate) shutdown_flush_timeout: Duration,
}

impl SinkConfig {
    #[must_use]
    pub const fn new(fifo_capacity: usize) -> Self {
        Self {
            fifo_capacity,
            max_flush_period: Duration::from_secs(3),
            shutdown_flush_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub const fn with_max_flush_period(mut self, period: Duration) -> Self {
        self.max_flush_period = period;
        self
    }

    #[must_use]
    pub const fn with_shutdown_flush_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_flush_timeout = timeout;
        self
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}
