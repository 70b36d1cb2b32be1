use criterion::{criterion_group, criterion_main, Criterion};
use water_gpu::{Context, RecordingDevice, ShaderLibrary};
use water_sim::{register_kernels, DropletSystem, Water};

fn bench_headless_tick(c: &mut Criterion) {
    let mut library = ShaderLibrary::new();
    register_kernels(&mut library);
    let device = RecordingDevice::new();
    let log = device.log();
    let mut context = Context::new(Box::new(device));
    let mut water = Water::new(&mut context, &library, 256).unwrap();
    let mut droplets = DropletSystem::default();

    c.bench_function("water_tick", |b| {
        b.iter(|| {
            droplets.spawn(0.0, 0.0);
            water.tick(&mut context).unwrap();
            droplets.update(1.0 / 60.0, &mut water.sink(&mut context)).unwrap();
            log.clear();
        })
    });
}

criterion_group!(benches, bench_headless_tick);
criterion_main!(benches);
