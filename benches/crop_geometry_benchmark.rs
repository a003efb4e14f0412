use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use studycrop::geometry::{CropTarget, FrameDims, Rect, compute_crop, mean_rect};

fn benchmark_compute_crop(c: &mut Criterion) {
    let mut group = c.benchmark_group("crop_geometry");

    let frame = FrameDims::new(826, 1204);
    let face = Rect::new(250, 120, 300, 340);

    // Tight, study-typical, and loose targets exercise the clamp paths
    for ratio in [0.05_f64, 0.08, 0.3] {
        group.bench_with_input(
            BenchmarkId::new("compute_crop", format!("ratio_{ratio}")),
            &ratio,
            |b, &ratio| {
                b.iter(|| {
                    compute_crop(
                        black_box(frame),
                        black_box(Some(&face)),
                        black_box(CropTarget::new(ratio, 0.85)),
                    )
                })
            },
        );
    }

    group.bench_function("compute_crop_fallback", |b| {
        b.iter(|| {
            compute_crop(
                black_box(frame),
                black_box(None),
                black_box(CropTarget::new(0.08, 0.85)),
            )
        })
    });

    group.bench_function("mean_rect_10_samples", |b| {
        let rects: Vec<Rect> = (0..10)
            .map(|i| Rect::new(250 + i, 120 + i, 300, 340))
            .collect();
        b.iter(|| mean_rect(black_box(&rects)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_compute_crop);
criterion_main!(benches);
