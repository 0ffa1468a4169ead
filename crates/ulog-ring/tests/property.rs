//! Property and boundary tests for the packet ring, run single-threaded
//! (one producer, the test thread itself as consumer) so failures are easy
//! to reproduce.

use proptest::prelude::*;
use ulog_ring::{channel, RingConfig};

fn send_and_collect(capacity: usize, payloads: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let (producer, consumer) = channel(capacity);
    let mut delivered = Vec::new();
    for payload in payloads {
        let mut reservation = match producer.reserve(payload.len()) {
            Some(r) => r,
            None => {
                // Ring temporarily full: drain before retrying, mirroring
                // how a real drain thread would interleave with producers.
                let batch = consumer.read();
                for p in batch.packets() {
                    delivered.push(p.to_vec());
                }
                batch.release();
                producer.reserve(payload.len()).expect("space after drain")
            }
        };
        reservation.payload_mut().copy_from_slice(payload);
        reservation.commit(payload.len());

        let batch = consumer.read();
        for p in batch.packets() {
            delivered.push(p.to_vec());
        }
        batch.release();
    }
    // Final drain for anything left pending.
    let batch = consumer.read();
    for p in batch.packets() {
        delivered.push(p.to_vec());
    }
    batch.release();
    delivered
}

proptest! {
    #[test]
    fn delivers_every_committed_payload_in_order(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..200)
    ) {
        let delivered = send_and_collect(4096, &payloads);
        prop_assert_eq!(delivered, payloads);
    }

    #[test]
    fn byte_integrity_holds_for_random_sizes(
        sizes in prop::collection::vec(1usize..256, 1..64)
    ) {
        let payloads: Vec<Vec<u8>> = sizes
            .into_iter()
            .enumerate()
            .map(|(i, len)| vec![(i % 256) as u8; len])
            .collect();
        let delivered = send_and_collect(8192, &payloads);
        prop_assert_eq!(delivered, payloads);
    }
}

#[test]
fn capacity_rounds_up_per_boundary_table() {
    assert_eq!(RingConfig::new(5).rounded_capacity(), 8);
    assert_eq!(RingConfig::new(1025).rounded_capacity(), 2048);
    assert_eq!(RingConfig::new(16384).rounded_capacity(), 16384);
}

#[test]
fn reservation_over_capacity_minus_header_always_fails() {
    let (producer, _consumer) = channel(64);
    assert!(producer.reserve(64).is_none());
    assert!(producer.reserve(57).is_none());
}

#[test]
fn high_volume_single_writer_single_reader_delivers_without_corruption() {
    for &capacity in &[16usize, 64, 256, 1024, 4096, 16384, 65536] {
        let (producer, consumer) = channel(capacity);
        let max_payload = (capacity / 4).max(1);
        let mut total_bytes = 0u64;
        let mut seq = 0u8;
        while total_bytes < 200_000 {
            let len = 1 + (seq as usize % max_payload);
            let payload: Vec<u8> = (0..len).map(|i| seq.wrapping_add(i as u8)).collect();
            let mut reservation = loop {
                if let Some(r) = producer.reserve(len) {
                    break r;
                }
                let batch = consumer.read();
                for p in batch.packets() {
                    total_bytes += p.len() as u64;
                }
                batch.release();
            };
            reservation.payload_mut().copy_from_slice(&payload);
            reservation.commit(len);
            seq = seq.wrapping_add(1);

            let batch = consumer.read();
            for p in batch.packets() {
                total_bytes += p.len() as u64;
            }
            batch.release();
        }
        assert!(total_bytes >= 200_000, "capacity {capacity} delivered {total_bytes} bytes");
    }
}
