//! Harvest orchestration: chapters, divisions and whole works.
//!
//! Extraction itself is synchronous and runs inside blocking tasks; the async
//! layer only bounds concurrency and collects results.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{
    PageLayout, WorkConfig, DEFAULT_CONCURRENCY, MAX_CONSECUTIVE_EMPTY, MAX_VERSE_PAGES,
};
use crate::error::{HarvesterError, Result};
use crate::extraction::{probe, BestRecords, VerseAssembler};
use crate::source::PageSource;
use crate::types::{ChapterExtraction, ChapterLocator, RunResult};

/// Extract one chapter from already fetched markup.
///
/// The existence probe runs first; a miss yields an empty extraction with
/// `page_found = false` instead of an error.
pub fn extract_chapter(
    work: &WorkConfig,
    html: &str,
    locator: &ChapterLocator,
    url: &str,
) -> Result<ChapterExtraction> {
    let assembler = VerseAssembler::new(work)?;
    Ok(extract_with(&assembler, work, html, locator, url))
}

fn extract_with(
    assembler: &VerseAssembler<'_>,
    work: &WorkConfig,
    html: &str,
    locator: &ChapterLocator,
    url: &str,
) -> ChapterExtraction {
    match probe(html, work) {
        Ok(()) => assembler.assemble(html, locator, url),
        Err(miss) => {
            tracing::debug!(chapter = %locator, url, reason = ?miss, "page has no verses");
            ChapterExtraction::not_found(locator.clone(), url)
        }
    }
}

/// Chapters and errors produced by one unit of work.
#[derive(Debug, Default)]
pub struct DivisionOutcome {
    pub chapters: Vec<ChapterExtraction>,
    pub errors: Vec<String>,
}

/// Fetches and extracts chapters of one work from a page source.
pub struct ChapterHarvester<'a> {
    source: &'a dyn PageSource,
    work: &'a WorkConfig,
    assembler: VerseAssembler<'a>,
}

impl<'a> ChapterHarvester<'a> {
    pub fn new(source: &'a dyn PageSource, work: &'a WorkConfig) -> Result<Self> {
        Ok(Self {
            source,
            work,
            assembler: VerseAssembler::new(work)?,
        })
    }

    /// Fetch and extract one chapter.
    ///
    /// A missing page is reported as `page_found = false`, not as an error.
    pub fn harvest(&self, locator: &ChapterLocator) -> Result<ChapterExtraction> {
        match self.work.layout {
            PageLayout::PerChapter => self.harvest_chapter_page(locator),
            PageLayout::PerVerse => self.harvest_verse_pages(locator),
        }
    }

    fn harvest_chapter_page(&self, locator: &ChapterLocator) -> Result<ChapterExtraction> {
        let url = self.work.chapter_url(locator.division, locator.chapter);
        match self.source.fetch(&url)? {
            Some(html) => Ok(extract_with(&self.assembler, self.work, &html, locator, &url)),
            None => {
                tracing::warn!(chapter = %locator, url = %url, "chapter page not found");
                Ok(ChapterExtraction::not_found(locator.clone(), url))
            }
        }
    }

    /// Walk verse pages from 1 until the hint is reached or three pages in a
    /// row are missing.
    fn harvest_verse_pages(&self, locator: &ChapterLocator) -> Result<ChapterExtraction> {
        let first_url = self.work.verse_url(locator.division, locator.chapter, 1);
        let limit = locator
            .verse_count_hint
            .map_or(MAX_VERSE_PAGES, |hint| hint.min(MAX_VERSE_PAGES));
        let page_locator = locator.clone().with_verse_hint(None);

        let mut records = BestRecords::new();
        let mut warnings = Vec::new();
        let mut skipped_nodes = 0;
        let mut misses = 0;
        let mut verse = 1;

        while verse <= limit && misses < MAX_CONSECUTIVE_EMPTY {
            let url = self.work.verse_url(locator.division, locator.chapter, verse);
            let page = match self.source.fetch(&url)? {
                Some(html) => extract_with(&self.assembler, self.work, &html, &page_locator, &url),
                None => ChapterExtraction::not_found(page_locator.clone(), url),
            };

            if page.is_empty() {
                misses += 1;
                tracing::debug!(chapter = %locator, verse, misses, "verse page empty");
                verse += 1;
                continue;
            }
            misses = 0;

            // A merged page covers several verses; continue after its last one
            let last = page.records.iter().map(|r| r.id.verse).max().unwrap_or(verse);
            skipped_nodes += page.skipped_nodes;
            warnings.extend(
                page.warnings
                    .iter()
                    .map(|w| format!("verse {verse}: {w}")),
            );
            records.insert_batch(page.records);
            verse = last.max(verse) + 1;
        }

        let records = records.into_records();
        if records.is_empty() {
            warnings.push("no verses extracted".to_string());
        }
        if let Some(hint) = locator.verse_count_hint {
            if hint as usize > records.len() {
                warnings.push(format!(
                    "expected {hint} verses, extracted {}",
                    records.len()
                ));
            }
        }

        Ok(ChapterExtraction {
            locator: locator.clone(),
            url: first_url,
            page_found: !records.is_empty(),
            records,
            skipped_nodes,
            warnings,
        })
    }

    /// Harvest chapters `1..=max_chapters` of a division in order.
    ///
    /// Stops after three consecutive chapters that are missing, empty or
    /// failed. Cancellation is checked between chapters.
    pub fn harvest_division(
        &self,
        division: Option<u32>,
        max_chapters: u32,
        cancel: &CancellationToken,
    ) -> DivisionOutcome {
        let mut outcome = DivisionOutcome::default();
        let mut consecutive_empty = 0;

        for chapter in 1..=max_chapters {
            if cancel.is_cancelled() {
                tracing::info!(work = %self.work.id, ?division, chapter, "division cancelled");
                break;
            }

            let locator = ChapterLocator::new(self.work.id.clone(), chapter).with_division(division);
            match self.harvest(&locator) {
                Ok(extraction) if !extraction.is_empty() => {
                    consecutive_empty = 0;
                    outcome.chapters.push(extraction);
                }
                Ok(extraction) => {
                    consecutive_empty += 1;
                    if extraction.page_found {
                        outcome.chapters.push(extraction);
                    }
                }
                Err(e) => {
                    consecutive_empty += 1;
                    tracing::error!(chapter = %locator, error = %e, "chapter failed");
                    outcome.errors.push(format!("{locator}: {e}"));
                }
            }

            if consecutive_empty >= MAX_CONSECUTIVE_EMPTY {
                tracing::info!(
                    work = %self.work.id,
                    ?division,
                    last_chapter = chapter,
                    "consecutive empty chapters, end of division"
                );
                break;
            }
        }

        outcome
    }
}

/// Options of a multi-chapter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Restrict a divided work to one division.
    pub division: Option<u32>,
    /// Cap the number of chapters per division (or of a flat work).
    pub max_chapters: Option<u32>,
    /// Maximum number of tasks running at once.
    pub concurrency: usize,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            division: None,
            max_chapters: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl HarvestOptions {
    #[must_use]
    pub fn with_division(mut self, division: Option<u32>) -> Self {
        self.division = division;
        self
    }

    #[must_use]
    pub fn with_max_chapters(mut self, max_chapters: Option<u32>) -> Self {
        self.max_chapters = max_chapters;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn cap(&self, chapters: u32) -> u32 {
        self.max_chapters.map_or(chapters, |max| max.min(chapters))
    }
}

/// One task of a run.
#[derive(Debug, Clone, Copy)]
enum Unit {
    Chapter(u32),
    Division { number: u32, chapters: u32 },
}

fn plan(work: &WorkConfig, options: &HarvestOptions) -> Result<Vec<Unit>> {
    if !work.has_divisions() {
        let chapters = options.cap(work.max_chapters(options.division)?);
        return Ok((1..=chapters).map(Unit::Chapter).collect());
    }

    let divisions: Vec<u32> = match options.division {
        Some(number) => vec![number],
        None => work.divisions.iter().map(|d| d.number).collect(),
    };
    divisions
        .into_iter()
        .map(|number| {
            Ok(Unit::Division {
                number,
                chapters: options.cap(work.max_chapters(Some(number))?),
            })
        })
        .collect()
}

fn run_unit(
    source: &dyn PageSource,
    work: &WorkConfig,
    unit: Unit,
    cancel: &CancellationToken,
) -> Result<DivisionOutcome> {
    let harvester = ChapterHarvester::new(source, work)?;
    match unit {
        Unit::Chapter(chapter) => {
            let locator = ChapterLocator::new(work.id.clone(), chapter);
            let mut outcome = DivisionOutcome::default();
            match harvester.harvest(&locator) {
                Ok(extraction) => outcome.chapters.push(extraction),
                Err(e) => {
                    tracing::error!(chapter = %locator, error = %e, "chapter failed");
                    outcome.errors.push(format!("{locator}: {e}"));
                }
            }
            Ok(outcome)
        }
        Unit::Division { number, chapters } => {
            Ok(harvester.harvest_division(Some(number), chapters, cancel))
        }
    }
}

/// Harvest a whole work (or one division of it) concurrently.
///
/// Flat works run one task per chapter; divided works run one task per
/// division, each probing its chapters sequentially. At most
/// `options.concurrency` tasks run at once. Cancelling the token stops new
/// tasks from starting; results of finished and running tasks are kept.
///
/// Returns `Err` only for invalid options; chapter failures are collected in
/// [`RunResult::errors`].
pub async fn harvest_work(
    source: Arc<dyn PageSource>,
    work: Arc<WorkConfig>,
    options: HarvestOptions,
    cancel: CancellationToken,
) -> Result<RunResult> {
    let units = plan(&work, &options)?;
    let started_at = Utc::now();
    let start = Instant::now();

    tracing::info!(
        work = %work.id,
        tasks = units.len(),
        concurrency = options.concurrency,
        "starting harvest"
    );

    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks: JoinSet<Result<DivisionOutcome>> = JoinSet::new();
    let mut errors = Vec::new();
    let mut cancelled = false;

    for unit in units {
        let permit = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!(work = %work.id, "harvest cancelled, no new tasks");
                cancelled = true;
                break;
            }
            permit = Arc::clone(&permits).acquire_owned() => permit,
        };
        let permit = match permit {
            Ok(permit) => permit,
            Err(e) => {
                errors.push(format!("semaphore closed: {e}"));
                break;
            }
        };

        let source = Arc::clone(&source);
        let work = Arc::clone(&work);
        let cancel = cancel.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            run_unit(source.as_ref(), &work, unit, &cancel)
        });
    }

    let mut chapters = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(outcome)) => {
                chapters.extend(outcome.chapters);
                errors.extend(outcome.errors);
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "harvest task failed");
                errors.push(e.to_string());
            }
            Err(e) => {
                let e = HarvesterError::TaskFailed(e.to_string());
                tracing::error!(error = %e, "harvest task panicked");
                errors.push(e.to_string());
            }
        }
    }
    chapters.sort_by_key(|c| (c.locator.division, c.locator.chapter));

    let result = RunResult {
        work: work.id.clone(),
        started_at,
        duration: start.elapsed(),
        chapters,
        errors,
        cancelled,
    };
    tracing::info!(
        work = %result.work,
        chapters = result.chapters.len(),
        records = result.total_records(),
        accepted = result.accepted_count(),
        degraded = result.degraded_count(),
        errors = result.errors.len(),
        cancelled = result.cancelled,
        duration_ms = result.duration.as_millis() as u64,
        "harvest finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{bhagavad_gita, srimad_bhagavatam};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source counting its requests.
    #[derive(Default)]
    struct MapSource {
        pages: HashMap<String, String>,
        failing: Vec<String>,
        requests: AtomicUsize,
    }

    impl MapSource {
        fn with_page(mut self, url: String, html: &str) -> Self {
            self.pages.insert(url, html.to_string());
            self
        }

        fn failing_at(mut self, url: String) -> Self {
            self.failing.push(url);
            self
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl PageSource for MapSource {
        fn fetch(&self, url: &str) -> Result<Option<String>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|u| u == url) {
                return Err(HarvesterError::RetriesExhausted {
                    attempts: 3,
                    message: "Server error: 503".to_string(),
                });
            }
            Ok(self.pages.get(url).cloned())
        }
    }

    fn page(verse: u32) -> String {
        format!(
            r#"<html><body><div class="av-verses"><div class="r-verse">
            <div class="r-label">ТЕКСТ {verse}</div>
            <div class="av-devanagari">धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</div>
            <div class="av-translation">Дхритараштра сказал: О Санджая, что сделали мои сыновья?</div>
            </div></div></body></html>"#
        )
    }

    #[test]
    fn test_extract_chapter_probe_miss() {
        let bg = bhagavad_gita();
        let locator = ChapterLocator::new("bg", 1);
        let extraction =
            extract_chapter(&bg, "<html><title>404</title></html>", &locator, "url").unwrap();
        assert!(!extraction.page_found);
        assert!(extraction.is_empty());
    }

    #[test]
    fn test_extract_chapter_assembles() {
        let bg = bhagavad_gita();
        let locator = ChapterLocator::new("bg", 1);
        let extraction = extract_chapter(&bg, &page(1), &locator, "url").unwrap();
        assert!(extraction.page_found);
        assert_eq!(extraction.records.len(), 1);
        assert!(extraction.records[0].passes_quality_gate());
    }

    #[test]
    fn test_missing_chapter_page_is_not_found() {
        let bg = bhagavad_gita();
        let source = MapSource::default();
        let harvester = ChapterHarvester::new(&source, &bg).unwrap();
        let extraction = harvester.harvest(&ChapterLocator::new("bg", 1)).unwrap();
        assert!(!extraction.page_found);
        assert_eq!(extraction.url, bg.chapter_url(None, 1));
    }

    #[test]
    fn test_division_stops_after_three_empty_chapters() {
        let sb = srimad_bhagavatam();
        let source = MapSource::default()
            .with_page(sb.chapter_url(Some(1), 1), &page(1))
            .with_page(sb.chapter_url(Some(1), 2), &page(1));
        let harvester = ChapterHarvester::new(&source, &sb).unwrap();

        let outcome = harvester.harvest_division(Some(1), 19, &CancellationToken::new());
        let chapters: Vec<u32> = outcome.chapters.iter().map(|c| c.locator.chapter).collect();
        assert_eq!(chapters, vec![1, 2]);
        assert_eq!(source.requests(), 5);
    }

    #[test]
    fn test_division_resets_empty_counter_and_counts_errors() {
        let sb = srimad_bhagavatam();
        let source = MapSource::default()
            .with_page(sb.chapter_url(Some(1), 1), &page(1))
            .failing_at(sb.chapter_url(Some(1), 2))
            .with_page(sb.chapter_url(Some(1), 4), &page(1));
        let harvester = ChapterHarvester::new(&source, &sb).unwrap();

        let outcome = harvester.harvest_division(Some(1), 19, &CancellationToken::new());
        let chapters: Vec<u32> = outcome.chapters.iter().map(|c| c.locator.chapter).collect();
        assert_eq!(chapters, vec![1, 4]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("sb 1.2"));
        assert_eq!(source.requests(), 7);
    }

    #[test]
    fn test_per_verse_layout_walks_pages() {
        let mut bg = bhagavad_gita();
        bg.layout = PageLayout::PerVerse;
        let source = MapSource::default()
            .with_page(bg.verse_url(None, 1, 1), &page(1))
            .with_page(bg.verse_url(None, 1, 2), &page(2))
            .with_page(bg.verse_url(None, 1, 4), &page(4));
        let harvester = ChapterHarvester::new(&source, &bg).unwrap();

        let extraction = harvester.harvest(&ChapterLocator::new("bg", 1)).unwrap();
        let verses: Vec<u32> = extraction.records.iter().map(|r| r.id.verse).collect();
        assert_eq!(verses, vec![1, 2, 4]);
        assert!(extraction.page_found);
        // 1, 2, 3 (miss), 4, then three misses
        assert_eq!(source.requests(), 7);
    }

    #[test]
    fn test_per_verse_layout_respects_hint() {
        let mut bg = bhagavad_gita();
        bg.layout = PageLayout::PerVerse;
        let source = MapSource::default()
            .with_page(bg.verse_url(None, 1, 1), &page(1))
            .with_page(bg.verse_url(None, 1, 2), &page(2));
        let harvester = ChapterHarvester::new(&source, &bg).unwrap();

        let locator = ChapterLocator::new("bg", 1).with_verse_hint(Some(1));
        let extraction = harvester.harvest(&locator).unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(source.requests(), 1);
    }

    #[test]
    fn test_plan_rejects_bad_division() {
        let bg = bhagavad_gita();
        let options = HarvestOptions::default().with_division(Some(2));
        assert!(matches!(
            plan(&bg, &options),
            Err(HarvesterError::InvalidDivision { .. })
        ));

        let sb = srimad_bhagavatam();
        let options = HarvestOptions::default().with_division(Some(13));
        assert!(plan(&sb, &options).is_err());
    }

    #[test]
    fn test_plan_caps_chapters() {
        let bg = bhagavad_gita();
        let options = HarvestOptions::default().with_max_chapters(Some(2));
        assert_eq!(plan(&bg, &options).unwrap().len(), 2);

        let sb = srimad_bhagavatam();
        assert_eq!(plan(&sb, &HarvestOptions::default()).unwrap().len(), 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_harvest_work_flat() {
        let bg = bhagavad_gita();
        let source = MapSource::default()
            .with_page(bg.chapter_url(None, 1), &page(1))
            .with_page(bg.chapter_url(None, 2), &page(1))
            .failing_at(bg.chapter_url(None, 3));

        let options = HarvestOptions::default()
            .with_max_chapters(Some(4))
            .with_concurrency(2);
        let result = harvest_work(
            Arc::new(source),
            Arc::new(bg),
            options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let chapters: Vec<u32> = result.chapters.iter().map(|c| c.locator.chapter).collect();
        assert_eq!(chapters, vec![1, 2, 4]);
        assert_eq!(result.total_records(), 2);
        assert_eq!(result.accepted_count(), 2);
        assert_eq!(result.errors.len(), 1);
        assert!(!result.cancelled);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_harvest_work_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = harvest_work(
            Arc::new(MapSource::default()),
            Arc::new(bhagavad_gita()),
            HarvestOptions::default(),
            cancel,
        )
        .await
        .unwrap();

        assert!(result.cancelled);
        assert!(result.chapters.is_empty());
        assert!(!result.is_success());
    }
}
