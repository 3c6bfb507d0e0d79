use bandscope::bands::{BandMapper, BandMappingTable, BandSmoother};
use bandscope::spectrum::SpectrumAnalyzer;
use bandscope::{BandCurve, BandEngine, EngineConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f32::consts::PI;

fn test_signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let t = n as f32 / 48000.0;
            0.5 * (2.0 * PI * 440.0 * t).sin() + 0.2 * (2.0 * PI * 3300.0 * t).sin()
        })
        .collect()
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");

    for frame_length in [1024usize, 4096, 16384] {
        let config = EngineConfig {
            frame_length,
            ring_capacity: frame_length * 2,
            ..Default::default()
        };
        let (mut engine, mut writer) = BandEngine::new(config).unwrap();
        let signal = test_signal(frame_length);

        group.bench_with_input(BenchmarkId::from_parameter(frame_length), &signal, |b, s| {
            b.iter(|| {
                writer.write(s);
                black_box(engine.tick().unwrap())
            })
        });
    }
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let frame = test_signal(4096);
    let mut analyzer = SpectrumAnalyzer::new(4096, Default::default());
    let mut spectrum = vec![0.0; analyzer.num_bins()];

    c.bench_function("analyze_4096", |b| {
        b.iter(|| analyzer.analyze(black_box(&frame), &mut spectrum).unwrap())
    });

    let table = BandMappingTable::build(48000.0, 4096, 1280, BandCurve::Logarithmic, 20.0, 20000.0);
    let mapper = BandMapper::new(table, Default::default(), Default::default(), -80.0, 1.0);
    let mut raw = vec![0.0; 1280];
    c.bench_function("map_1280", |b| b.iter(|| mapper.map(black_box(&spectrum), &mut raw)));

    let mut smoother = BandSmoother::new(1280, 0.85, 0.12);
    let mut out = vec![0.0; 1280];
    c.bench_function("smooth_1280", |b| b.iter(|| smoother.smooth(black_box(&raw), &mut out)));

    let (engine, _writer) = BandEngine::new(EngineConfig::default()).unwrap();
    let mut bands = vec![0.0; 1280];
    c.bench_function("get_frequencies_1280", |b| {
        b.iter(|| engine.get_frequencies(black_box(&mut bands)).unwrap())
    });
}

criterion_group!(benches, bench_cycle, bench_stages);
criterion_main!(benches);
