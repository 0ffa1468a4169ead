//! A lock-free multi-producer / single-consumer packet ring, plus the
//! blocking notifier that lets producers and the consumer park instead of
//! spinning on "full" and "empty".
//!
//! Producers reserve space, fill it in, and commit; the consumer reads
//! batches of committed packets and releases them once processed. See
//! [`channel`] for the entry point.

mod header;
mod invariants;
mod notifier;
mod ring;

pub use notifier::Notifier;
pub use ring::{channel, channel_with_config, Batch, Consumer, Producer, Reservation, RingConfig};
