use aftimpute::prelude::simulator::*;
use aftimpute::*;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn dataset() -> Dataset {
    let settings = SimulationSettings::default().with_seed(7);
    generate(&settings, &StreamBank::new(7)).unwrap().dataset
}

fn replicate_benchmark(c: &mut Criterion) {
    let data = dataset();
    let options = ImputationOptions::default();
    let streams = StreamBank::new(7);

    c.bench_function("imputation replicate n=200", |b| {
        b.iter(|| {
            let mut rng = streams.stream(Slot::Imputation(0));
            black_box(imputation::run_replicate(&data, &options, &mut rng).ok());
        })
    });
}

fn fitting_benchmark(c: &mut Criterion) {
    let data = dataset();
    let streams = StreamBank::new(7);

    c.bench_function("complete-case AFT fit", |b| {
        b.iter(|| black_box(CompleteCase::default().estimate(&data, &streams).unwrap()))
    });

    c.bench_function("auxiliary Cox fit", |b| {
        let times: Vec<f64> = data.iter().map(|o| o.x()).collect();
        let events: Vec<bool> = data.iter().map(|o| o.v()).collect();
        let z = nalgebra::DMatrix::from_iterator(data.len(), 1, data.iter().map(|o| o.z()));
        b.iter(|| black_box(CoxRegression::new().fit(&times, &events, &z).unwrap()))
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let settings = SimulationSettings::default().with_seed(7);
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("compare_methods M=5", |b| {
        b.iter(|| black_box(compare_methods(&settings).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    replicate_benchmark,
    fitting_benchmark,
    pipeline_benchmark
);
criterion_main!(benches);
