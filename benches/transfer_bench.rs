use compressor_validate::analytical::GainComputer;
use compressor_validate::metrics::rms_db_window;
use compressor_validate::pcm::{decode_pcm, encode_pcm16};
use compressor_validate::runner::evaluate;
use compressor_validate::signals::{stepped_sine, StimulusSettings};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_stepped_sine(c: &mut Criterion) {
    let settings = StimulusSettings::default();

    c.bench_function("stepped_sine_48k", |b| {
        b.iter(|| black_box(stepped_sine(black_box(&settings), 48000)))
    });
}

fn bench_rms_window(c: &mut Criterion) {
    let plan = stepped_sine(&StimulusSettings::default(), 48000);
    let data = vec![plan.samples.clone(), plan.samples.clone()];
    let window = plan.windows[7];

    c.bench_function("rms_db_window_stereo", |b| {
        b.iter(|| black_box(rms_db_window(&data, black_box(window.start), window.length)))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let plan = stepped_sine(&StimulusSettings::default(), 48000);
    let data = vec![plan.samples.clone(), plan.samples.clone()];
    let curve = GainComputer::default();

    c.bench_function("evaluate_15_levels", |b| {
        b.iter(|| black_box(evaluate(&plan, &data, &curve, 0.75)))
    });
}

fn bench_pcm16_roundtrip(c: &mut Criterion) {
    let plan = stepped_sine(&StimulusSettings::default(), 48000);

    c.bench_function("pcm16_encode_decode", |b| {
        b.iter(|| {
            let bytes = encode_pcm16(black_box(&plan.samples), 2);
            black_box(decode_pcm(&bytes, 2))
        })
    });
}

criterion_group!(
    benches,
    bench_stepped_sine,
    bench_rms_window,
    bench_evaluate,
    bench_pcm16_roundtrip
);
criterion_main!(benches);
