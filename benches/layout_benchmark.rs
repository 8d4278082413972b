//! Benchmarks for layout reconstruction performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks run the pipeline over synthetic report pages.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reportlayout::layout::analyze_page;
use reportlayout::{CoordinateOrigin, LayoutConfig, LayoutEngine, MemorySource, SpanRecord};

/// Creates span records for one report page: a header, a paragraph, a
/// field/value block and a results grid.
fn create_test_page(page: u32) -> Vec<SpanRecord> {
    let mut records = Vec::new();

    records.push(
        SpanRecord::new(format!("{} Resultados", page), [50.0, 60.0, 200.0, 76.0], page)
            .with_font("Arial-Bold", 16.0)
            .bold(),
    );

    for i in 0..6 {
        let y = 100.0 + 12.0 * i as f64;
        records.push(
            SpanRecord::new(
                "Los valores medidos durante el ensayo se encuentran dentro de los",
                [50.0, y, 440.0, y + 10.0],
                page,
            )
            .with_font("Arial", 10.0),
        );
    }

    for (i, (field, value)) in [("Fecha", "25-02-2025"), ("Hora", "15:16"), ("Potencia", "150 MW")]
        .iter()
        .enumerate()
    {
        let y = 200.0 + 18.0 * i as f64;
        records.push(SpanRecord::new(*field, [50.0, y, 98.0, y + 10.0], page).with_font("Arial", 10.0));
        records.push(SpanRecord::new(*value, [200.0, y, 260.0, y + 10.0], page).with_font("Arial", 10.0));
    }

    for r in 0..20 {
        for c in 0..5 {
            let x = 50.0 + 100.0 * c as f64;
            let y = 300.0 + 16.0 * r as f64;
            records.push(
                SpanRecord::new(format!("{},{}", r, c), [x, y, x + 30.0, y + 10.0], page)
                    .with_font("Arial", 10.0),
            );
        }
    }

    records
}

fn create_test_document(page_count: u32) -> Vec<SpanRecord> {
    (1..=page_count).flat_map(create_test_page).collect()
}

/// Benchmark the single-page pipeline.
fn bench_analyze_page(c: &mut Criterion) {
    let config = LayoutConfig::default();
    let records = create_test_page(1);

    c.bench_function("analyze_page", |b| {
        b.iter(|| {
            analyze_page(
                black_box(&config),
                1,
                black_box(records.clone()),
                CoordinateOrigin::TopLeft,
            )
        });
    });
}

/// Benchmark whole documents at various sizes.
fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let engine = LayoutEngine::new(LayoutConfig::default()).unwrap();

    for page_count in [1, 5, 20].iter() {
        let source = Arc::new(MemorySource::from_records(create_test_document(*page_count)));

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| engine.process(black_box(Arc::clone(&source))));
        });
    }

    group.finish();
}

/// Benchmark engine construction overhead.
fn bench_engine_creation(c: &mut Criterion) {
    c.bench_function("engine_creation", |b| {
        b.iter(|| LayoutEngine::new(LayoutConfig::default().with_workers(2)).unwrap());
    });
}

criterion_group!(benches, bench_analyze_page, bench_engine, bench_engine_creation);
criterion_main!(benches);
