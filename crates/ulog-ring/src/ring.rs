//! Lock-free MPSC packet ring: reserve/commit on the producer side,
//! batch-read/release on the consumer side.
//!
//! Ported from `mpsc_ring.h` in the original `ulog` sources, generalized to
//! Rust ownership: the shared buffer lives behind an `Arc<PacketRing>`,
//! producer handles are `Clone` (one per writer thread), and a reservation
//! that is dropped without a `commit` auto-discards, via `Drop`, instead of
//! requiring every caller to remember to mark it.

use std::cell::Cell;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::header::{align8, packet_size, DISCARD_FLAG, HEADER_LEN, SIZE_MASK};
use crate::invariants::ring_invariant;
use crate::notifier::Notifier;

const MAX_PACKET_COUNT: usize = 1024;

/// Ambient configuration for a ring's capacity, following the `Config`-struct
/// convention used throughout this workspace rather than a bare integer
/// argument.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    capacity: usize,
}

impl RingConfig {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// The requested capacity rounded up to a power of two (minimum 2), the
    /// actual byte size the ring will allocate.
    #[must_use]
    pub fn rounded_capacity(&self) -> u32 {
        (self.capacity.max(2) as u32).next_power_of_two()
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

pub(crate) struct PacketRing {
    data: *mut u8,
    mask: u32,
    cons_head: CachePadded<AtomicU32>,
    prod_head: CachePadded<AtomicU32>,
    prod_last: AtomicU32,
    prod_notifier: Notifier,
    cons_notifier: Notifier,
}

// SAFETY: `data` points at a heap allocation owned exclusively by this
// `PacketRing` (reclaimed in `Drop`); all access to it goes through the
// atomic header fields and the reserve/commit/release protocol below, never
// through a `&mut` reference to the struct itself.
unsafe impl Send for PacketRing {}
unsafe impl Sync for PacketRing {}

impl PacketRing {
    fn new(config: RingConfig) -> Arc<Self> {
        let capacity = config.rounded_capacity();
        let buf = vec![0u8; capacity as usize].into_boxed_slice();
        let data = Box::into_raw(buf) as *mut u8;
        Arc::new(Self {
            data,
            mask: capacity - 1,
            cons_head: CachePadded::new(AtomicU32::new(0)),
            prod_head: CachePadded::new(AtomicU32::new(0)),
            prod_last: AtomicU32::new(0),
            prod_notifier: Notifier::new(),
            cons_notifier: Notifier::new(),
        })
    }

    fn capacity(&self) -> u32 {
        self.mask + 1
    }

    fn next_buffer(&self, index: u32) -> u32 {
        (index & !self.mask).wrapping_add(self.capacity())
    }

    /// # Safety
    /// `offset` must be `< capacity()` and the header at that offset must
    /// not currently be in use by another reservation or an unreleased
    /// packet.
    unsafe fn header_at(&self, offset: u32) -> *mut u8 {
        self.data.add(offset as usize)
    }

    fn data_size_atomic(&self, offset: u32) -> &AtomicU32 {
        // SAFETY: offset is always a valid in-bounds header position
        // produced by this module's own arithmetic, 4-byte aligned because
        // every packet_size is a multiple of 8.
        unsafe { AtomicU32::from_ptr(self.header_at(offset).add(4).cast::<u32>()) }
    }

    fn zero_range(&self, start: u32, len: u32) {
        if len == 0 {
            return;
        }
        // SAFETY: [start, start+len) was returned by `check_real_size` as a
        // span of fully-scanned, already-committed-or-discarded packets
        // wholly inside the buffer.
        unsafe { ptr::write_bytes(self.header_at(start), 0, len as usize) };
    }
}

impl Drop for PacketRing {
    fn drop(&mut self) {
        // SAFETY: reconstructs exactly the allocation made in `new`; no
        // other reference to it survives the ring itself.
        unsafe {
            drop(Box::from_raw(slice::from_raw_parts_mut(
                self.data,
                self.capacity() as usize,
            )));
        }
    }
}

/// Creates a channel with the given capacity (rounded up to a power of two,
/// minimum 2).
#[must_use]
pub fn channel(capacity: usize) -> (Producer, Consumer) {
    channel_with_config(RingConfig::new(capacity))
}

#[must_use]
pub fn channel_with_config(config: RingConfig) -> (Producer, Consumer) {
    let ring = PacketRing::new(config);
    (
        Producer {
            ring: ring.clone(),
            last_reserved_end: Cell::new(0),
        },
        Consumer { ring },
    )
}

/// A handle producer threads use to reserve and commit packets. Cheap to
/// `clone` — one clone per writer thread is the expected usage, mirroring
/// `std::sync::mpsc::Sender`.
#[derive(Clone)]
pub struct Producer {
    ring: Arc<PacketRing>,
    last_reserved_end: Cell<u32>,
}

impl Producer {
    /// Tries to reserve `payload_len` bytes without blocking.
    ///
    /// Returns `None` if the ring cannot currently fit the packet — either
    /// transiently (not enough free space right now) or permanently (the
    /// payload plus header exceeds the ring's total capacity).
    #[must_use]
    pub fn reserve(&self, payload_len: usize) -> Option<Reservation<'_>> {
        let payload_len = u32::try_from(payload_len).ok()?;
        let ring = &*self.ring;
        let needed = packet_size(payload_len);
        let mut prod_head = ring.prod_head.load(Ordering::Relaxed);
        loop {
            let cons_head = ring.cons_head.load(Ordering::Acquire);
            let used = prod_head.wrapping_sub(cons_head);
            if u64::from(used) + u64::from(needed) > u64::from(ring.capacity()) {
                return None;
            }

            let end = prod_head.wrapping_add(needed);
            let rel = end & ring.mask;

            if rel >= needed || rel == 0 {
                match ring.prod_head.compare_exchange_weak(
                    prod_head,
                    end,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        if rel == 0 {
                            ring.prod_last.store(end, Ordering::Relaxed);
                        }
                        let offset = prod_head & ring.mask;
                        self.last_reserved_end.set(end);
                        return Some(Reservation::new(ring, offset, payload_len));
                    }
                    Err(actual) => {
                        prod_head = actual;
                        continue;
                    }
                }
            }

            if (cons_head & ring.mask) >= needed {
                let new_end = ring.next_buffer(prod_head).wrapping_add(needed);
                match ring.prod_head.compare_exchange_weak(
                    prod_head,
                    new_end,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        ring.prod_last.store(prod_head, Ordering::Relaxed);
                        self.last_reserved_end.set(new_end);
                        return Some(Reservation::new(ring, 0, payload_len));
                    }
                    Err(actual) => {
                        prod_head = actual;
                        continue;
                    }
                }
            }

            return None;
        }
    }

    /// Reserves `payload_len` bytes, retrying on every consumer wake-up
    /// until it succeeds or `timeout` elapses.
    pub fn reserve_blocking(&self, payload_len: usize, timeout: Duration) -> Option<Reservation<'_>> {
        if let Some(r) = self.reserve(payload_len) {
            return Some(r);
        }
        let ring = &*self.ring;
        let mut result = None;
        let got = ring.cons_notifier.wait_for(timeout, || {
            result = self.reserve(payload_len);
            result.is_some()
        });
        if got {
            result
        } else {
            None
        }
    }

    /// Blocks until the consumer has released at least up to this
    /// producer's last reservation, or `wait_time` elapses. Returns whether
    /// the flush was observed within the deadline.
    pub fn flush(&self, wait_time: Duration) -> bool {
        let target = self.last_reserved_end.get();
        self.ring.flush_past(target, wait_time)
    }

    /// Blocks until the consumer has caught up to whatever has been
    /// reserved ring-wide as of this call (not just this producer's own
    /// writes) — the snapshot an external, ring-wide `flush()` needs.
    pub fn flush_to_now(&self, wait_time: Duration) -> bool {
        let target = self.ring.prod_head.load(Ordering::Relaxed);
        self.ring.flush_past(target, wait_time)
    }

    /// Wakes both the producer and consumer notifiers without waiting —
    /// used by shutdown to unstick any blocked caller.
    pub fn notify_all(&self) {
        self.ring.prod_notifier.notify_when_blocking();
        self.ring.cons_notifier.notify_when_blocking();
    }
}

impl PacketRing {
    /// Waits until `cons_head` has passed `target` (mod 2^32), waking any
    /// producer that might itself be blocked so it gets a chance to notice
    /// the flush request.
    fn flush_past(&self, target: u32, wait_time: Duration) -> bool {
        self.prod_notifier.notify_when_blocking();
        self.cons_notifier
            .wait_for(wait_time, || is_passed(target, self.cons_head.load(Ordering::Acquire)))
    }
}

/// `true` if `tail` has advanced past `head`, tolerating 32-bit wraparound.
fn is_passed(head: u32, tail: u32) -> bool {
    tail.wrapping_sub(head) < (1u32 << 31)
}

/// A reserved, not-yet-committed packet slot. Dropping it without calling
/// [`Reservation::commit`] is equivalent to `commit(0)`: the slot is marked
/// discarded so the consumer skips it without blocking forever.
pub struct Reservation<'p> {
    ring: &'p PacketRing,
    offset: u32,
    payload_len: u32,
    committed: bool,
}

impl<'p> Reservation<'p> {
    fn new(ring: &'p PacketRing, offset: u32, payload_len: u32) -> Self {
        // SAFETY: this offset was just exclusively claimed by the CAS in
        // `reserve`; no other producer or the consumer can touch it until
        // `data_size` is made non-zero below.
        unsafe {
            ring.header_at(offset).cast::<u32>().write(payload_len);
        }
        Self {
            ring,
            offset,
            payload_len,
            committed: false,
        }
    }

    /// The full reserved payload region, ready to be filled in before
    /// `commit`.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        // SAFETY: offset+HEADER_LEN..+payload_len is exclusively owned by
        // this reservation until commit/drop.
        unsafe {
            slice::from_raw_parts_mut(
                self.ring.header_at(self.offset).add(HEADER_LEN as usize),
                self.payload_len as usize,
            )
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.payload_len as usize
    }

    /// Commits `real_size` bytes (`<= capacity()`), making the packet
    /// visible to the consumer. `real_size == 0` discards the slot.
    pub fn commit(mut self, real_size: usize) {
        self.commit_inner(real_size);
    }

    fn commit_inner(&mut self, real_size: usize) {
        ring_invariant!(
            real_size as u64 <= u64::from(self.payload_len),
            "commit size {real_size} exceeds reservation of {}",
            self.payload_len
        );
        let data_size = self.ring.data_size_atomic(self.offset);
        if real_size > 0 {
            data_size.store(real_size as u32, Ordering::Release);
        } else {
            data_size.fetch_or(DISCARD_FLAG, Ordering::Relaxed);
        }
        self.ring.prod_notifier.notify_when_blocking();
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.commit_inner(0);
        }
    }
}

struct Group {
    start: u32,
    packet_count: usize,
    raw_size: u32,
}

/// A batch of packets ready to be delivered to the drain loop, spanning at
/// most two contiguous regions (the second only appears when the batch
/// straddles a lap boundary).
pub struct Batch<'c> {
    ring: &'c PacketRing,
    group0: Option<Group>,
    group1: Option<Group>,
    cons_head_next: u32,
}

impl<'c> Batch<'c> {
    fn empty(ring: &'c PacketRing, cons_head: u32) -> Self {
        Self {
            ring,
            group0: None,
            group1: None,
            cons_head_next: cons_head,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.group0.is_none()
    }

    /// Iterates the non-discarded packets in this batch, in delivery order.
    pub fn packets(&self) -> impl Iterator<Item = &'c [u8]> {
        let ring = self.ring;
        let a = self
            .group0
            .as_ref()
            .map(|g| PacketIter::new(ring, g.start, g.packet_count));
        let b = self
            .group1
            .as_ref()
            .map(|g| PacketIter::new(ring, g.start, g.packet_count));
        a.into_iter().flatten().chain(b.into_iter().flatten())
    }

    /// Zeros the consumed byte ranges and advances `cons_head`, freeing the
    /// space for producers and waking any that were blocked on it.
    pub fn release(self) {
        if let Some(g) = &self.group0 {
            self.ring.zero_range(g.start, g.raw_size);
        }
        if let Some(g) = &self.group1 {
            self.ring.zero_range(g.start, g.raw_size);
        }
        self.ring.cons_head.store(self.cons_head_next, Ordering::Release);
        self.ring.cons_notifier.notify_when_blocking();
    }
}

struct PacketIter<'c> {
    ring: &'c PacketRing,
    offset: u32,
    remaining: usize,
}

impl<'c> PacketIter<'c> {
    fn new(ring: &'c PacketRing, offset: u32, remaining: usize) -> Self {
        Self { ring, offset, remaining }
    }
}

impl<'c> Iterator for PacketIter<'c> {
    type Item = &'c [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            // SAFETY: this header was already validated as finalized by
            // `check_real_size` when the batch was built; nobody else
            // touches it until `Batch::release` zeros it.
            let header = unsafe { self.ring.header_at(self.offset) };
            let reserve_size = unsafe { header.cast::<u32>().read() };
            let raw = self.ring.data_size_atomic(self.offset).load(Ordering::Acquire);
            let size = raw & SIZE_MASK;
            let discarded = raw & DISCARD_FLAG != 0;

            self.remaining -= 1;
            self.offset = self.offset.wrapping_add(HEADER_LEN + align8(reserve_size));

            if discarded {
                continue;
            }
            // SAFETY: [header+HEADER_LEN, +size) is the committed payload,
            // readable until this batch is released.
            let payload = unsafe { slice::from_raw_parts(header.add(HEADER_LEN as usize), size as usize) };
            return Some(payload);
        }
        None
    }
}

fn check_real_size(ring: &PacketRing, start: u32, scan_len: u32) -> Option<Group> {
    let mut offset = start;
    let end = start + scan_len;
    let mut count = 0usize;
    while offset < end {
        let raw = ring.data_size_atomic(offset).load(Ordering::Acquire);
        if raw == 0 {
            break;
        }
        count += 1;
        // SAFETY: see `PacketIter::next`.
        let reserve_size = unsafe { ring.header_at(offset).cast::<u32>().read() };
        offset = offset.wrapping_add(HEADER_LEN + align8(reserve_size));
        if count >= MAX_PACKET_COUNT {
            break;
        }
    }
    if count == 0 {
        None
    } else {
        Some(Group {
            start,
            packet_count: count,
            raw_size: offset - start,
        })
    }
}

/// The single consumer handle. Not `Clone` — the protocol assumes exactly
/// one drain thread.
pub struct Consumer {
    ring: Arc<PacketRing>,
}

impl Consumer {
    /// A non-blocking batch read.
    #[must_use]
    pub fn read(&self) -> Batch<'_> {
        let ring = &*self.ring;
        let cons_head = ring.cons_head.load(Ordering::Relaxed);
        let prod_head = ring.prod_head.load(Ordering::Acquire);

        if cons_head == prod_head {
            return Batch::empty(ring, cons_head);
        }

        let cur_prod = prod_head & ring.mask;
        let cur_cons = cons_head & ring.mask;

        if cur_cons < cur_prod {
            return match check_real_size(ring, cur_cons, cur_prod - cur_cons) {
                Some(g) => {
                    let next = cons_head.wrapping_add(g.raw_size);
                    Batch {
                        ring,
                        group0: Some(g),
                        group1: None,
                        cons_head_next: next,
                    }
                }
                None => Batch::empty(ring, cons_head),
            };
        }

        // Different laps: prod_head already wrapped. prod_last marks the
        // boundary of the previous lap's committed region and may briefly
        // lag prod_head — spin until it catches up rather than risk
        // reading a stale boundary.
        let mut prod_last = ring.prod_last.load(Ordering::Relaxed);
        while prod_last.wrapping_sub(cons_head) > ring.capacity() {
            std::thread::yield_now();
            prod_last = ring.prod_last.load(Ordering::Relaxed);
        }

        if cons_head == prod_last {
            return match check_real_size(ring, 0, cur_prod) {
                Some(g) => {
                    let next = if cur_cons == 0 {
                        cons_head.wrapping_add(g.raw_size)
                    } else {
                        ring.next_buffer(cons_head).wrapping_add(g.raw_size)
                    };
                    Batch {
                        ring,
                        group0: Some(g),
                        group1: None,
                        cons_head_next: next,
                    }
                }
                None => Batch::empty(ring, cons_head),
            };
        }

        let expected_size = prod_last.wrapping_sub(cons_head);
        let Some(group0) = check_real_size(ring, cur_cons, expected_size) else {
            return Batch::empty(ring, cons_head);
        };

        if expected_size == group0.raw_size {
            let group1 = check_real_size(ring, 0, cur_prod);
            let group1_size = group1.as_ref().map_or(0, |g| g.raw_size);
            let next = ring.next_buffer(cons_head).wrapping_add(group1_size);
            return Batch {
                ring,
                group0: Some(group0),
                group1,
                cons_head_next: next,
            };
        }

        let next = cons_head.wrapping_add(group0.raw_size);
        Batch {
            ring,
            group0: Some(group0),
            group1: None,
            cons_head_next: next,
        }
    }

    /// Blocks until data is available or `other_exit` becomes true.
    pub fn read_blocking(&self, mut other_exit: impl FnMut() -> bool) -> Batch<'_> {
        let ring = &*self.ring;
        let mut result: Option<Batch<'_>> = None;
        ring.prod_notifier.wait(|| {
            let batch = self.read();
            let has_data = !batch.is_empty();
            result = Some(batch);
            has_data || other_exit()
        });
        result.unwrap_or_else(|| Batch::empty(ring, ring.cons_head.load(Ordering::Relaxed)))
    }

    /// Blocks until data is available, `other_exit` becomes true, or
    /// `timeout` elapses.
    pub fn read_blocking_for(&self, timeout: Duration, mut other_exit: impl FnMut() -> bool) -> Batch<'_> {
        let ring = &*self.ring;
        let mut result: Option<Batch<'_>> = None;
        ring.prod_notifier.wait_for(timeout, || {
            let batch = self.read();
            let has_data = !batch.is_empty();
            result = Some(batch);
            has_data || other_exit()
        });
        result.unwrap_or_else(|| Batch::empty(ring, ring.cons_head.load(Ordering::Relaxed)))
    }

    /// Waits (up to `wait_time`) until every packet committed as of this
    /// call has been released.
    pub fn flush(&self, wait_time: Duration) -> bool {
        let target = self.ring.prod_head.load(Ordering::Relaxed);
        self.ring.flush_past(target, wait_time)
    }

    /// Wakes both the producer and consumer notifiers without waiting —
    /// used by shutdown to unstick any blocked caller.
    pub fn notify_all(&self) {
        self.ring.prod_notifier.notify_when_blocking();
        self.ring.cons_notifier.notify_when_blocking();
    }
}
