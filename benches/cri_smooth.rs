use criterion::{criterion_group, criterion_main, Criterion};

use epicurve::smooth::smooth;

fn criterion_benchmark(c: &mut Criterion) {
    fn fixture(len: usize) -> Vec<f64> {
        (0..len)
            .map(|day| {
                let x = day as f64;
                1000.0 * f64::exp(-0.5 * ((x - 60.0) / 15.0).powi(2)) + if day % 2 == 0 { 25.0 } else { -25.0 }
            })
            .collect()
    }

    fn bench(c: &mut Criterion, len: usize, window: usize, degree: usize) {
        let values = fixture(len);
        c.bench_function(&format!("cri_smooth_{len}w{window}d{degree}"), |b| {
            b.iter(|| smooth(&values, window, degree).unwrap());
        });
    }
    bench(c, 120, 13, 2);
    bench(c, 120, 21, 4);
    bench(c, 1000, 13, 2);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
