use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::filter_and_rank;
use schema::{BoundingBox, RawDetection};

/// Mixed candidates: a third too weak, a third too small, the rest kept.
fn mock_candidates(n: usize) -> Vec<RawDetection> {
    (0..n)
        .map(|i| {
            let (confidence, side) = match i % 3 {
                0 => (0.1, 0.2),
                1 => (0.8, 0.02),
                _ => (0.3 + (i % 7) as f64 * 0.1, 0.2),
            };
            RawDetection {
                class_id: (i % 8) as u32,
                confidence,
                bbox: BoundingBox::new(0.5, 0.5, side, side),
            }
        })
        .collect()
}

fn benchmark_filter_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_rank");

    for n in [0usize, 10, 100, 300] {
        let candidates = mock_candidates(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &candidates, |b, cands| {
            b.iter(|| filter_and_rank(black_box(cands), black_box((1920, 1080))));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_filter_rank);
criterion_main!(benches);
