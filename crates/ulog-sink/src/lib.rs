//! Async sink wrapper: owns a packet ring and a dedicated drain thread that
//! fans each record out to an ordered chain of [`Sink`]s, with periodic
//! flush, timed/blocking enqueue, and a clean shutdown.

mod config;
mod sink;
mod wrapper;

pub use config::SinkConfig;
pub use sink::Sink;
pub use wrapper::AsyncSinkWrapper;
