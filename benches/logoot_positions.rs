use criterion::{black_box, criterion_group, criterion_main, Criterion};
use delta_sync::core::ids::ClientId;
use delta_sync::logoot::{positions_between, LogootId, LogootPosition};

fn bounds() -> (LogootPosition, LogootPosition) {
    let p = LogootPosition::new(vec![LogootId { pos: 0, client_id: ClientId(1) }]);
    let q = LogootPosition::new(vec![LogootId { pos: 1_000_000, client_id: ClientId(2) }]);
    (p, q)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (p, q) = bounds();

    c.bench_function("positions_between_single_insert", |b| {
        b.iter(|| positions_between(black_box(&p), black_box(&q), 1, ClientId(9)))
    });

    c.bench_function("positions_between_batch_of_100", |b| {
        b.iter(|| positions_between(black_box(&p), black_box(&q), 100, ClientId(9)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
