//! Integration tests for the page-parallel engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reportlayout::{
    BlockKind, Error, LayoutConfig, LayoutEngine, MemorySource, PageIssue, Result, SpanRecord,
    TokenSource,
};

fn line(text: &str, y: f64, page: u32) -> SpanRecord {
    let width = 6.0 * text.chars().count() as f64;
    SpanRecord::new(text, [50.0, y, 50.0 + width, y + 10.0], page).with_font("Arial", 10.0)
}

fn report(pages: u32) -> Vec<SpanRecord> {
    let mut records = Vec::new();
    for page in 1..=pages {
        records.push(
            SpanRecord::new(format!("{} Resultados", page), [50.0, 60.0, 200.0, 76.0], page)
                .with_font("Arial-Bold", 16.0)
                .bold(),
        );
        records.push(line("Los valores medidos se encuentran dentro de", 100.0, page));
        records.push(line("los límites de la norma de referencia.", 112.0, page));
        for r in 0..4 {
            for c in 0..3 {
                let x = 50.0 + 120.0 * c as f64;
                let y = 160.0 + 18.0 * r as f64;
                records.push(
                    SpanRecord::new(format!("v{}{}", r, c), [x, y, x + 24.0, y + 10.0], page)
                        .with_font("Arial", 10.0),
                );
            }
        }
    }
    records
}

/// Sleeps on one page to trip the per-page timeout.
struct SlowSource {
    inner: MemorySource,
    slow_page: u32,
    delay: Duration,
}

impl TokenSource for SlowSource {
    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn page_spans(&self, page: u32) -> Result<Vec<SpanRecord>> {
        if page == self.slow_page {
            thread::sleep(self.delay);
        }
        self.inner.page_spans(page)
    }
}

/// Fails a page on its first read only.
struct FlakySource {
    inner: MemorySource,
    flaky_page: u32,
    reads: AtomicUsize,
}

impl TokenSource for FlakySource {
    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn page_spans(&self, page: u32) -> Result<Vec<SpanRecord>> {
        if page == self.flaky_page && self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Error::Upstream("OCR service unavailable".to_string()));
        }
        self.inner.page_spans(page)
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let records = report(6);
    let sequential = LayoutEngine::new(LayoutConfig::default().sequential())
        .unwrap()
        .process_records(records.clone());
    let parallel = LayoutEngine::new(LayoutConfig::default().with_workers(4))
        .unwrap()
        .process_records(records);

    assert_eq!(sequential, parallel);
    assert_eq!(parallel.page_count, 6);
    assert!(parallel.degraded_pages.is_empty());
    assert_eq!(parallel.blocks_of_kind(BlockKind::Table).count(), 6);
    assert_eq!(parallel.blocks_of_kind(BlockKind::Header).count(), 6);

    let ids: Vec<u64> = parallel.blocks.iter().map(|b| b.id).collect();
    let expected: Vec<u64> = (1..=parallel.blocks.len() as u64).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_slow_page_times_out() {
    let source = SlowSource {
        inner: MemorySource::from_records(report(3)),
        slow_page: 2,
        delay: Duration::from_millis(1500),
    };
    let engine = LayoutEngine::new(
        LayoutConfig::default()
            .with_workers(3)
            .with_page_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let started = Instant::now();
    let doc = engine.process(Arc::new(source));

    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(doc.degraded_pages, vec![2]);
    assert_eq!(
        doc.page_report(2).unwrap().issues,
        vec![PageIssue::Timeout { timeout_ms: 100 }]
    );
    assert_eq!(doc.blocks_on_page(2).count(), 0);
    assert!(doc.blocks_on_page(1).count() > 0);
    assert!(doc.blocks_on_page(3).count() > 0);
}

#[test]
fn test_slow_page_does_not_block_single_worker() {
    let source = SlowSource {
        inner: MemorySource::from_records(report(3)),
        slow_page: 1,
        delay: Duration::from_millis(1500),
    };
    let engine = LayoutEngine::new(
        LayoutConfig::default()
            .sequential()
            .with_page_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    assert_eq!(engine.workers(), 1);

    let started = Instant::now();
    let doc = engine.process(Arc::new(source));

    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(doc.degraded_pages, vec![1]);
    assert_eq!(doc.blocks_on_page(1).count(), 0);
    assert!(doc.blocks_on_page(2).count() > 0);
    assert!(doc.blocks_on_page(3).count() > 0);
}

#[test]
fn test_generous_timeout_keeps_every_page() {
    let source = SlowSource {
        inner: MemorySource::from_records(report(2)),
        slow_page: 1,
        delay: Duration::from_millis(20),
    };
    let engine = LayoutEngine::new(
        LayoutConfig::default()
            .with_workers(2)
            .with_page_timeout(Duration::from_secs(10)),
    )
    .unwrap();

    let doc = engine.process(Arc::new(source));
    assert!(doc.degraded_pages.is_empty());
    assert!(doc.blocks_on_page(1).count() > 0);
}

#[test]
fn test_rerun_recovers_failed_page() {
    let source: Arc<dyn TokenSource> = Arc::new(FlakySource {
        inner: MemorySource::from_records(report(3)),
        flaky_page: 2,
        reads: AtomicUsize::new(0),
    });
    let engine = LayoutEngine::new(LayoutConfig::default().with_workers(2)).unwrap();

    let first = engine.process(Arc::clone(&source));
    assert_eq!(first.degraded_pages, vec![2]);
    assert!(matches!(
        first.page_report(2).unwrap().issues.as_slice(),
        [PageIssue::UpstreamExtractionFailure { .. }]
    ));

    let second = engine.rerun_page(&first, source, 2).unwrap();
    assert!(second.degraded_pages.is_empty());
    assert_eq!(
        second.blocks_on_page(2).count(),
        second.blocks_on_page(1).count()
    );

    // Untouched pages keep their blocks; ids are renumbered in order
    let text = |doc: &reportlayout::Document, page: u32| -> Vec<String> {
        doc.blocks_on_page(page).map(|b| b.plain_text()).collect()
    };
    assert_eq!(text(&first, 1), text(&second, 1));
    assert_eq!(text(&first, 3), text(&second, 3));
    let ids: Vec<u64> = second.blocks.iter().map(|b| b.id).collect();
    let expected: Vec<u64> = (1..=second.blocks.len() as u64).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_rerun_rejects_unknown_page() {
    let engine = LayoutEngine::new(LayoutConfig::default().sequential()).unwrap();
    let source = Arc::new(MemorySource::from_records(report(2)));
    let doc = engine.process(Arc::clone(&source));

    assert!(matches!(
        engine.rerun_page(&doc, source.clone(), 0),
        Err(Error::PageOutOfRange(0, 2))
    ));
    assert!(matches!(
        engine.rerun_page(&doc, source, 3),
        Err(Error::PageOutOfRange(3, 2))
    ));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let configs = [
        LayoutConfig::default().with_line_gap_threshold(0.0),
        LayoutConfig::default().with_y_tolerance(f64::NAN),
        LayoutConfig::default().with_min_table_rows(1),
        LayoutConfig::default().with_column_match_fraction(1.5),
        LayoutConfig::default().with_page_timeout(Duration::ZERO),
    ];
    for config in configs {
        assert!(matches!(
            LayoutEngine::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_empty_source() {
    let engine = LayoutEngine::new(LayoutConfig::default()).unwrap();
    let doc = engine.process(Arc::new(MemorySource::new()));

    assert_eq!(doc.page_count, 0);
    assert!(doc.blocks.is_empty());
    assert!(doc.pages.is_empty());
}
