//! Debug-only invariant checks for the ring's producer/consumer protocol.
//!
//! A violation here means a caller broke the reserve/commit contract (e.g.
//! committed more than it reserved) — a programming error, not a runtime
//! condition callers should handle. Logged at error level in every build,
//! and additionally turned into a panic in debug builds.

macro_rules! ring_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            tracing::error!($($arg)+);
            debug_assert!($cond, $($arg)+);
        }
    };
}

pub(crate) use ring_invariant;
