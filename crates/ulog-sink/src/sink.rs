use ulog_status::Status;

/// Something that consumes record bytes, one packet at a time, and can be
/// asked to flush. Only the drain thread ever touches a `Sink` — the trait
/// itself carries no thread-safety requirement beyond `Send`, which is what
/// lets a chain of sinks move into the drain thread at construction.
///
/// A sink that reports [`Status::is_full`] is treated as permanently
/// exhausted and dropped from the chain; any other non-OK status is logged
/// and the chain continues.
pub trait Sink: Send {
    fn sink_it(&mut self, data: &[u8]) -> Status;
    fn flush(&mut self) -> Status;
}
