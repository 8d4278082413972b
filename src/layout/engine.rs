//! Document assembly: runs the page pipeline on a worker pool and merges the
//! results in page order.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{Error, PageIssue, Result};
use crate::model::{Block, Document, PageReport};
use crate::source::{MemorySource, TokenSource};

use super::classify::{Candidate, ContentClassifier};
use super::config::LayoutConfig;
use super::normalize::{CoordinateOrigin, SpanRecord, TokenNormalizer};
use super::paragraph::ParagraphAssembler;
use super::rows::RowClusterer;
use super::sections::SectionAssociator;
use super::signals::PageStyle;
use super::table::TableAssembler;

/// Blocks and report produced for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    /// Processing report
    pub report: PageReport,
    /// Blocks in reading order, ids not yet assigned
    pub blocks: Vec<Block>,
}

impl PageOutcome {
    /// An empty, degraded result.
    pub fn degraded(page: u32, issue: PageIssue) -> Self {
        Self {
            report: PageReport::degraded(page, issue),
            blocks: Vec::new(),
        }
    }
}

enum PageMessage {
    Started { page: u32, at: Instant },
    Finished { page: u32, outcome: PageOutcome },
}

/// Run stages 1 to 6 on one page of span records.
///
/// This is a pure function of its inputs. A page with no valid tokens yields
/// an empty degraded outcome.
pub fn analyze_page(
    config: &LayoutConfig,
    page: u32,
    spans: Vec<SpanRecord>,
    origin: CoordinateOrigin,
) -> PageOutcome {
    let normalized = TokenNormalizer::new()
        .with_origin(origin)
        .normalize(page, spans);

    if normalized.tokens.is_empty() {
        log::warn!("page {}: no usable tokens", page);
        let mut report = PageReport::degraded(page, PageIssue::EmptyPage);
        report.malformed_tokens = normalized.malformed;
        report.issues.extend(normalized.issues);
        return PageOutcome {
            report,
            blocks: Vec::new(),
        };
    }

    let token_count = normalized.tokens.len();
    let rows = RowClusterer::new(config).cluster(normalized.tokens);
    let style = PageStyle::from_rows(&rows);
    let row_count = rows.len();

    let tables = TableAssembler::new(config).assemble(rows);
    let paragraphs = ParagraphAssembler::new(config, &style).assemble(tables.leftover);

    let mut candidates: Vec<Candidate> = tables
        .tables
        .into_iter()
        .map(Candidate::Table)
        .chain(paragraphs.drafts.into_iter().map(Candidate::Text))
        .collect();
    candidates.sort_by(|a, b| {
        a.top()
            .total_cmp(&b.top())
            .then_with(|| a.left().total_cmp(&b.left()))
    });

    let classifier = ContentClassifier::new(config, &style);
    let blocks: Vec<Block> = candidates
        .into_iter()
        .map(|candidate| classifier.classify(page, candidate))
        .collect();

    log::debug!(
        "page {}: {} tokens, {} rows, {} blocks, {} fragments discarded",
        page,
        token_count,
        row_count,
        blocks.len(),
        paragraphs.discarded
    );

    let mut report = PageReport::ok(page);
    report.malformed_tokens = normalized.malformed;
    report.block_count = blocks.len();
    report.issues = normalized.issues;
    report.issues.extend(tables.issues);

    PageOutcome { report, blocks }
}

/// Merge per-page outcomes into a document.
///
/// Pages are concatenated in ascending order, ids are assigned 1, 2, 3...
/// in that order, and sections are linked over the whole document.
pub fn assemble_document(page_count: u32, outcomes: BTreeMap<u32, PageOutcome>) -> Document {
    let mut doc = Document::new();
    doc.page_count = page_count;

    for (page, outcome) in outcomes {
        let mut report = outcome.report;
        report.block_count = outcome.blocks.len();
        if report.is_degraded() {
            doc.degraded_pages.push(page);
        }
        doc.pages.push(report);
        doc.blocks.extend(outcome.blocks);
    }

    for (idx, block) in doc.blocks.iter_mut().enumerate() {
        block.id = idx as u64 + 1;
    }
    doc.sections = SectionAssociator::new().associate(&mut doc.blocks);

    log::info!(
        "assembled {} pages: {} blocks, {} degraded",
        doc.page_count,
        doc.blocks.len(),
        doc.degraded_pages.len()
    );
    doc
}

/// Page-parallel layout reconstruction engine.
///
/// # Example
///
/// ```no_run
/// use reportlayout::{LayoutConfig, LayoutEngine, MemorySource};
/// use std::sync::Arc;
///
/// let engine = LayoutEngine::new(LayoutConfig::default())?;
/// let source = MemorySource::from_path("tokens.json")?;
/// let doc = engine.process(Arc::new(source));
/// println!("{} blocks", doc.blocks.len());
/// # Ok::<(), reportlayout::Error>(())
/// ```
#[derive(Clone)]
pub struct LayoutEngine {
    config: Arc<LayoutConfig>,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("config", &self.config)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl LayoutEngine {
    /// Validate the configuration and start the worker pool.
    pub fn new(config: LayoutConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("reportlayout-page-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(pool),
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Number of page workers.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Process every page of a source.
    ///
    /// Never fails: pages whose source errors, panics, times out or has no
    /// tokens are listed in `degraded_pages` and contribute no blocks.
    pub fn process<S>(&self, source: Arc<S>) -> Document
    where
        S: TokenSource + ?Sized + 'static,
    {
        let page_count = source.page_count();
        let pages: Vec<u32> = (1..=page_count).collect();
        let outcomes = self.run_pages(source, &pages);
        assemble_document(page_count, outcomes)
    }

    /// Process span records already held in memory.
    pub fn process_records(&self, records: Vec<SpanRecord>) -> Document {
        self.process(Arc::new(MemorySource::from_records(records)))
    }

    /// Re-run one page and return a new document with that page's blocks
    /// replaced wholesale. Ids and sections are reassigned.
    pub fn rerun_page<S>(&self, doc: &Document, source: Arc<S>, page: u32) -> Result<Document>
    where
        S: TokenSource + ?Sized + 'static,
    {
        if page == 0 || page > doc.page_count {
            return Err(Error::PageOutOfRange(page, doc.page_count));
        }

        let mut outcomes: BTreeMap<u32, PageOutcome> = doc
            .pages
            .iter()
            .map(|report| {
                let blocks = doc
                    .blocks
                    .iter()
                    .filter(|b| b.page() == report.page_number)
                    .cloned()
                    .collect();
                (
                    report.page_number,
                    PageOutcome {
                        report: report.clone(),
                        blocks,
                    },
                )
            })
            .collect();

        let fresh = self.run_pages(source, &[page]);
        outcomes.extend(fresh);

        Ok(assemble_document(doc.page_count, outcomes))
    }

    fn run_pages<S>(&self, source: Arc<S>, pages: &[u32]) -> BTreeMap<u32, PageOutcome>
    where
        S: TokenSource + ?Sized + 'static,
    {
        let (tx, rx) = unbounded::<PageMessage>();
        let runner = PageRunner {
            config: Arc::clone(&self.config),
            source,
            claims: Arc::new(pages.iter().map(|&p| (p, AtomicBool::new(false))).collect()),
            tx,
        };

        for &page in pages {
            let runner = runner.clone();
            self.pool.spawn(move || runner.run(page));
        }

        // Pages stuck behind timed-out workers get a thread of their own
        let overflow = |page: u32| {
            let runner = runner.clone();
            let spawned = thread::Builder::new()
                .name(format!("reportlayout-overflow-{}", page))
                .spawn(move || runner.run(page));
            if let Err(e) = spawned {
                log::warn!("page {}: could not start overflow thread: {}", page, e);
            }
        };

        collect(
            rx,
            pages,
            self.config.page_timeout_ms,
            self.pool.current_num_threads(),
            overflow,
        )
    }
}

/// Everything a worker needs to process pages of one run.
///
/// A page is run at most once: the pool and any overflow thread race for
/// its claim.
struct PageRunner<S: ?Sized> {
    config: Arc<LayoutConfig>,
    source: Arc<S>,
    claims: Arc<BTreeMap<u32, AtomicBool>>,
    tx: Sender<PageMessage>,
}

impl<S: ?Sized> Clone for PageRunner<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            source: Arc::clone(&self.source),
            claims: Arc::clone(&self.claims),
            tx: self.tx.clone(),
        }
    }
}

impl<S> PageRunner<S>
where
    S: TokenSource + ?Sized,
{
    fn run(&self, page: u32) {
        let claimed = self
            .claims
            .get(&page)
            .is_some_and(|claim| !claim.swap(true, Ordering::SeqCst));
        if !claimed {
            return;
        }
        // The collector may already have given up on this page
        let _ = self.tx.send(PageMessage::Started {
            page,
            at: Instant::now(),
        });
        let outcome = run_guarded(&self.config, page, self.source.as_ref());
        let _ = self.tx.send(PageMessage::Finished { page, outcome });
    }
}

/// Fetch and analyze one page, turning source errors and panics into a
/// degraded outcome.
fn run_guarded<S>(config: &LayoutConfig, page: u32, source: &S) -> PageOutcome
where
    S: TokenSource + ?Sized,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| match source.page_spans(page) {
        Ok(spans) => analyze_page(config, page, spans, source.origin()),
        Err(e) => {
            log::warn!("page {}: upstream extraction failed: {}", page, e);
            PageOutcome::degraded(
                page,
                PageIssue::UpstreamExtractionFailure {
                    message: e.to_string(),
                },
            )
        }
    }));

    result.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("page {}: worker panicked: {}", page, message);
        PageOutcome::degraded(page, PageIssue::WorkerPanic { message })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Gather outcomes until every page is resolved.
///
/// A page's deadline starts when a worker picks it up. Results arriving
/// after the deadline are dropped. Once every worker is held by a timed-out
/// page, the pages not yet started are handed to `overflow`.
fn collect<F>(
    rx: Receiver<PageMessage>,
    pages: &[u32],
    timeout_ms: Option<u64>,
    workers: usize,
    overflow: F,
) -> BTreeMap<u32, PageOutcome>
where
    F: Fn(u32),
{
    let timeout = timeout_ms.map(Duration::from_millis);
    let mut results: BTreeMap<u32, PageOutcome> = BTreeMap::new();
    let mut deadlines: BTreeMap<u32, Instant> = BTreeMap::new();
    let mut started: BTreeSet<u32> = BTreeSet::new();
    let mut stalled = 0usize;
    let mut overflowed = false;

    while results.len() < pages.len() {
        let message = match deadlines.values().min() {
            Some(&deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match message {
            Ok(PageMessage::Started { page, at }) => {
                started.insert(page);
                if let Some(timeout) = timeout {
                    deadlines.insert(page, at + timeout);
                }
            }
            Ok(PageMessage::Finished { page, outcome }) => {
                deadlines.remove(&page);
                if results.contains_key(&page) {
                    // A timed-out worker came back
                    stalled = stalled.saturating_sub(1);
                } else {
                    results.insert(page, outcome);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let expired: Vec<u32> = deadlines
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(page, _)| *page)
                    .collect();
                for page in expired {
                    deadlines.remove(&page);
                    stalled += 1;
                    let timeout_ms = timeout_ms.unwrap_or_default();
                    log::warn!("page {}: abandoned after {} ms", page, timeout_ms);
                    results.insert(
                        page,
                        PageOutcome::degraded(page, PageIssue::Timeout { timeout_ms }),
                    );
                }

                if !overflowed && stalled >= workers {
                    overflowed = true;
                    for &page in pages {
                        if !started.contains(&page) && !results.contains_key(&page) {
                            log::debug!("page {}: every worker stalled, running on overflow", page);
                            overflow(page);
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                for &page in pages {
                    results.entry(page).or_insert_with(|| {
                        PageOutcome::degraded(
                            page,
                            PageIssue::WorkerPanic {
                                message: "worker exited without a result".to_string(),
                            },
                        )
                    });
                }
                break;
            }
        }
    }

    results
}
