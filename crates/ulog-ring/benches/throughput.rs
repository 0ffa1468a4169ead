use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ulog_ring::channel;

fn single_thread_round_trip(c: &mut Criterion) {
    let (producer, consumer) = channel(1 << 16);
    let payload = [0xABu8; 64];

    c.bench_function("reserve_commit_read_release_64b", |b| {
        b.iter(|| {
            let mut r = producer.reserve(payload.len()).expect("ring sized for this loop");
            r.payload_mut().copy_from_slice(&payload);
            r.commit(payload.len());

            let batch = consumer.read();
            for p in batch.packets() {
                black_box(p);
            }
            batch.release();
        });
    });
}

criterion_group!(benches, single_thread_round_trip);
criterion_main!(benches);
