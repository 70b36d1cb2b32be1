use criterion::{black_box, criterion_group, criterion_main, Criterion};
use water_math::{Matrix4, Raytracer, TransformContext, Vector3, Viewport};

fn bench_inverse(c: &mut Criterion) {
    let m = Matrix4::perspective(45.0, 1.5, 0.01, 100.0)
        * Matrix4::translate(0.0, 0.0, -4.0)
        * Matrix4::rotate(-25.0, 1.0, 0.0, 0.0);
    c.bench_function("matrix_inverse", |b| b.iter(|| black_box(m).inverse()));
}

fn bench_picking(c: &mut Criterion) {
    let mut transforms = TransformContext::new();
    transforms.projection.perspective(45.0, 1.5, 0.01, 100.0);
    transforms.model_view.translate(0.0, 0.0, -4.0).rotate(25.0, 1.0, 0.0, 0.0);
    let viewport = Viewport::new(0, 0, 1200, 800);
    c.bench_function("raytracer_pick", |b| {
        b.iter(|| {
            let tracer = Raytracer::new(&transforms, viewport);
            let ray = tracer.ray_for_pixel(black_box(300.0), black_box(500.0));
            Raytracer::hit_plane(tracer.eye, ray, 0.0) + Vector3::ZERO
        });
    });
}

criterion_group!(benches, bench_inverse, bench_picking);
criterion_main!(benches);
