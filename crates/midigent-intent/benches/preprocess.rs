//! Preprocessing and keyword fallback throughput.
//!
//! Run with: cargo bench -p midigent-intent

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use midigent_intent::{keyword_draft, preprocess, registry};

const REQUESTS: &[(&str, &str)] = &[
    ("short", "120 BPM lofi beat"),
    (
        "numbers",
        "A 2:30 dnb roller at 174 bpm in F# minor, 8 tracks on 10 channels, 7/8",
    ),
    (
        "long",
        "“Epic” cinematic piece for a boss fight — strings, brass, timpani and choir, \
         building from quiet to massive over 3 mins, key of D, with synth pads and \
         a rhythmic elec gtr ostinato underneath the drums",
    ),
];

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");
    for (label, text) in REQUESTS {
        group.bench_with_input(BenchmarkId::from_parameter(label), text, |b, text| {
            b.iter(|| black_box(preprocess(black_box(text))));
        });
    }
    group.finish();
}

fn bench_fallback(c: &mut Criterion) {
    let registry = registry();
    let mut group = c.benchmark_group("keyword_fallback");
    for (label, text) in REQUESTS {
        let pre = preprocess(text);
        group.bench_with_input(BenchmarkId::from_parameter(label), &pre, |b, pre| {
            b.iter(|| black_box(keyword_draft(&pre.normalized, &pre.numbers, registry)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_fallback);
criterion_main!(benches);
