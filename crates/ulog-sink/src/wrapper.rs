use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ulog_ring::{channel_with_config, Batch, Consumer, Producer, RingConfig};
use ulog_status::Status;

use crate::config::SinkConfig;
use crate::sink::Sink;

/// Owns the packet ring and a dedicated drain thread that fans each record
/// out to an ordered chain of sinks, with periodic flush and a clean
/// shutdown.
///
/// Producer threads call [`AsyncSinkWrapper::sink_it`] /
/// [`AsyncSinkWrapper::sink_it_timeout`]; nothing but the drain thread ever
/// touches the sinks themselves.
pub struct AsyncSinkWrapper {
    producer: Producer,
    should_exit: Arc<AtomicBool>,
    should_flush: Arc<AtomicBool>,
    shutdown_flush_timeout: Duration,
    drain: Option<JoinHandle<()>>,
}

impl AsyncSinkWrapper {
    #[must_use]
    pub fn new(config: SinkConfig, sinks: Vec<Box<dyn Sink>>) -> Self {
        let (producer, consumer) = channel_with_config(RingConfig::new(config.fifo_capacity));
        let should_exit = Arc::new(AtomicBool::new(false));
        let should_flush = Arc::new(AtomicBool::new(false));

        let drain_exit = should_exit.clone();
        let drain_flush = should_flush.clone();
        let max_flush_period = config.max_flush_period;
        let drain = std::thread::Builder::new()
            .name("ulog-sink-drain".into())
            .spawn(move || drain_loop(consumer, sinks, drain_exit, drain_flush, max_flush_period))
            .expect("spawning the drain thread");

        Self {
            producer,
            should_exit,
            should_flush,
            shutdown_flush_timeout: config.shutdown_flush_timeout,
            drain: Some(drain),
        }
    }

    /// Enqueues `data` without blocking. Returns `Full` if the ring cannot
    /// currently fit the record.
    pub fn sink_it(&self, data: &[u8]) -> Status {
        match self.producer.reserve(data.len()) {
            Some(mut reservation) => {
                reservation.payload_mut().copy_from_slice(data);
                reservation.commit(data.len());
                Status::ok()
            }
            None => Status::full(),
        }
    }

    /// Enqueues `data`, retrying until it fits or `timeout` elapses.
    pub fn sink_it_timeout(&self, data: &[u8], timeout: Duration) -> Status {
        match self.producer.reserve_blocking(data.len(), timeout) {
            Some(mut reservation) => {
                reservation.payload_mut().copy_from_slice(data);
                reservation.commit(data.len());
                Status::ok()
            }
            None => Status::full(),
        }
    }

    /// Requests an out-of-band flush and waits (up to `wait_time`) for the
    /// drain thread to have caught up to everything reserved as of this
    /// call.
    pub fn flush(&self, wait_time: Duration) -> Status {
        self.should_flush.store(true, Ordering::Release);
        self.producer.notify_all();
        if self.producer.flush_to_now(wait_time) {
            Status::ok()
        } else {
            Status::io_error("flush deadline elapsed before drain caught up")
        }
    }
}

impl Drop for AsyncSinkWrapper {
    fn drop(&mut self) {
        self.producer.flush_to_now(self.shutdown_flush_timeout);
        self.should_exit.store(true, Ordering::Release);
        self.producer.notify_all();
        if let Some(drain) = self.drain.take() {
            let _ = drain.join();
        }
    }
}

fn drain_loop(
    consumer: Consumer,
    mut sinks: Vec<Box<dyn Sink>>,
    should_exit: Arc<AtomicBool>,
    should_flush: Arc<AtomicBool>,
    max_flush_period: Duration,
) {
    let mut last_flush = Instant::now();
    let mut need_flush = false;

    loop {
        let wake_pred = || should_flush.load(Ordering::Acquire) || should_exit.load(Ordering::Acquire);

        let mut flush_now = false;
        let batch: Batch<'_> = if should_flush.load(Ordering::Acquire) {
            should_flush.store(false, Ordering::Release);
            flush_now = true;
            consumer.read()
        } else if need_flush {
            consumer.read_blocking_for(max_flush_period, wake_pred)
        } else {
            consumer.read_blocking(wake_pred)
        };

        let had_data = !batch.is_empty();
        for packet in batch.packets() {
            sink_all(&mut sinks, packet);
        }
        batch.release();

        if flush_now || (need_flush && last_flush.elapsed() >= max_flush_period) {
            flush_all(&mut sinks);
            last_flush = Instant::now();
            need_flush = false;
        } else if had_data {
            need_flush = true;
        }

        if should_exit.load(Ordering::Acquire) {
            break;
        }
    }
}

fn sink_all(sinks: &mut Vec<Box<dyn Sink>>, packet: &[u8]) {
    sinks.retain_mut(|sink| {
        let status = sink.sink_it(packet);
        if status.is_full() {
            tracing::warn!("sink reported permanently full, dropping it from the chain");
            false
        } else {
            if !status.ok_bool() {
                tracing::error!(%status, "sink reported an error, continuing with the rest of the chain");
            }
            true
        }
    });
}

fn flush_all(sinks: &mut [Box<dyn Sink>]) -> Status {
    let mut worst = Status::ok();
    for sink in sinks.iter_mut() {
        let status = sink.flush();
        if !status.ok_bool() {
            tracing::error!(%status, "sink flush failed");
            worst = status;
        }
    }
    worst
}
