//! Page-level verse assembly.
//!
//! Every candidate node moves through the same states:
//!
//! ```text
//! Located -> Resolved -> Extracted -> Scored -> Accepted
//!                                            -> DegradedRetry -> Accepted
//!                                                             -> DegradedFinal
//! ```
//!
//! A node whose verse number cannot be resolved leaves the machine without a
//! record. When no candidate nodes are located at all, a page-wide scan
//! numbers verse-shaped nodes sequentially.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};

use crate::config::{WorkConfig, MIN_CONTEXT_CHARS, PAGE_SCAN_LIMIT};
use crate::error::Result;
use crate::extraction::fields::{FieldExtractor, Scope};
use crate::extraction::locator::{ElementLocator, LocateMethod};
use crate::extraction::merge::MergedBlockSplitter;
use crate::extraction::numbering::{VerseNumberResolver, VerseNumbers};
use crate::extraction::quality::QualityScorer;
use crate::html::{ancestor_elements, flatten_text, sibling_elements};
use crate::text::{char_len, clean_text, preview};
use crate::types::{
    ChapterExtraction, ChapterLocator, ExtractionMethod, QualityReport, VerseContent, VerseRecord,
};

/// Content extracted by one path, with its score.
#[derive(Debug, Clone)]
struct Attempt {
    content: VerseContent,
    method: ExtractionMethod,
    report: QualityReport,
}

/// Terminal state of a resolved node.
#[derive(Debug)]
enum Outcome {
    /// Cleared the quality gate, possibly after a retry.
    Accepted(Attempt),
    /// No attempt cleared the gate; the best one is kept.
    DegradedFinal(Attempt),
}

impl Outcome {
    fn into_attempt(self) -> Attempt {
        match self {
            Self::Accepted(attempt) | Self::DegradedFinal(attempt) => attempt,
        }
    }
}

/// Assembles verse records from one page.
pub struct VerseAssembler<'w> {
    work: &'w WorkConfig,
    resolver: VerseNumberResolver,
    locator: ElementLocator<'w>,
    extractor: FieldExtractor<'w>,
    scorer: QualityScorer<'w>,
    splitter: MergedBlockSplitter<'w>,
}

impl<'w> VerseAssembler<'w> {
    /// Build an assembler for a work, compiling its selectors and patterns.
    pub fn new(work: &'w WorkConfig) -> Result<Self> {
        let resolver = VerseNumberResolver::new(&work.labels)?;
        let locator = ElementLocator::new(work, resolver.clone())?;
        let scorer = QualityScorer::new(work);
        Ok(Self {
            work,
            resolver,
            locator,
            extractor: FieldExtractor::new(work),
            scorer,
            splitter: MergedBlockSplitter::new(work, scorer),
        })
    }

    /// Parse a page and assemble its records.
    #[must_use]
    pub fn assemble(&self, html: &str, locator: &ChapterLocator, url: &str) -> ChapterExtraction {
        let doc = Html::parse_document(html);
        self.assemble_document(&doc, locator, url)
    }

    /// Assemble records from an already parsed page.
    #[must_use]
    pub fn assemble_document(
        &self,
        doc: &Html,
        locator: &ChapterLocator,
        url: &str,
    ) -> ChapterExtraction {
        let located = self.locator.locate(doc);
        let mut records = BestRecords::new();
        let mut skipped_nodes = 0;

        if located.nodes.is_empty() {
            tracing::debug!(chapter = %locator, "no candidate nodes, scanning page");
            for record in self.scan_page(doc, locator) {
                records.insert_batch(vec![record]);
            }
        } else {
            if let LocateMethod::Hint { selector, unwrapped } = &located.method {
                tracing::debug!(
                    chapter = %locator,
                    selector = %selector,
                    unwrapped,
                    candidates = located.nodes.len(),
                    "candidates located"
                );
            }
            for node in &located.nodes {
                match self.assemble_node(*node, locator) {
                    Some(node_records) => records.insert_batch(node_records),
                    None => skipped_nodes += 1,
                }
            }
        }

        let records = records.into_records();
        let mut extraction = ChapterExtraction {
            locator: locator.clone(),
            url: url.to_string(),
            page_found: true,
            records,
            skipped_nodes,
            warnings: Vec::new(),
        };
        self.finish(&mut extraction);
        extraction
    }

    /// Run one candidate node through the state machine.
    ///
    /// Returns `None` when the node carries no verse number.
    fn assemble_node(
        &self,
        node: ElementRef<'_>,
        locator: &ChapterLocator,
    ) -> Option<Vec<VerseRecord>> {
        // Located -> Resolved
        let text = flatten_text(node);
        let Some(numbers) = self.resolver.resolve(Some(node), &text) else {
            tracing::debug!(
                chapter = %locator,
                text = %preview(&clean_text(&text), 60),
                "node skipped, no verse number"
            );
            return None;
        };
        let raw_text_length = char_len(&clean_text(&text));

        // Resolved -> Extracted -> Scored
        let method = if numbers.is_range() {
            ExtractionMethod::MergedBlock
        } else {
            ExtractionMethod::Structured
        };
        let first = self.attempt(&Scope::node(node, &text), method);
        let outcome = if first.report.is_accepted() {
            Outcome::Accepted(first)
        } else {
            self.retry(node, &text, numbers, first)
        };

        if let Outcome::DegradedFinal(attempt) = &outcome {
            tracing::warn!(
                chapter = %locator,
                verse = numbers.first(),
                score = attempt.report.score,
                issues = ?attempt.report.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "verse below quality threshold"
            );
        }
        let attempt = outcome.into_attempt();

        let records = match numbers {
            VerseNumbers::Range(..) => self.splitter.split(
                locator,
                &numbers.verses(),
                &attempt.content,
                raw_text_length,
            ),
            VerseNumbers::Single(verse) => vec![self.splitter.record(
                locator,
                verse,
                attempt.content,
                attempt.method,
                raw_text_length,
                None,
            )],
        };
        Some(records)
    }

    fn attempt(&self, scope: &Scope<'_>, method: ExtractionMethod) -> Attempt {
        let content = self.extractor.extract_all(scope);
        let report = self.scorer.score(&content);
        Attempt {
            content,
            method,
            report,
        }
    }

    /// DegradedRetry: context search in ancestors, then siblings, then
    /// fragment reconstruction. The first attempt clearing the gate wins;
    /// otherwise the best scoring attempt is kept, the original on ties.
    fn retry(
        &self,
        node: ElementRef<'_>,
        text: &str,
        numbers: VerseNumbers,
        original: Attempt,
    ) -> Outcome {
        let mut best = original;

        let contexts = self
            .ancestor_spans(node, text, numbers.first())
            .into_iter()
            .map(|span| (span, ExtractionMethod::ParentContext))
            .chain(
                self.sibling_spans(node, text, numbers)
                    .into_iter()
                    .map(|span| (span, ExtractionMethod::SiblingContext)),
            )
            .chain(std::iter::once((
                text.to_string(),
                ExtractionMethod::FragmentReconstruction,
            )));

        for (span, method) in contexts {
            let attempt = self.attempt(&Scope::text_only(&span), method);
            tracing::debug!(
                verse = numbers.first(),
                method = %method,
                score = attempt.report.score,
                "retry attempt"
            );
            if attempt.report.is_accepted() {
                return Outcome::Accepted(attempt);
            }
            if attempt.report.score > best.report.score {
                best = attempt;
            }
        }
        Outcome::DegradedFinal(best)
    }

    /// Text of each sufficiently long ancestor, from the verse's own label up
    /// to the next verse label.
    fn ancestor_spans(&self, node: ElementRef<'_>, text: &str, verse: u32) -> Vec<String> {
        let own = clean_text(text);
        ancestor_elements(node)
            .filter(|el| !matches!(el.value().name(), "html" | "body"))
            .filter_map(|ancestor| {
                let context = flatten_text(ancestor);
                if char_len(&context) <= MIN_CONTEXT_CHARS {
                    return None;
                }
                let label = self.resolver.label_span(&context, verse)?;
                let end = self
                    .resolver
                    .next_label(&context, label.end)
                    .unwrap_or(context.len());
                let span = context[label.start..end].to_string();
                (clean_text(&span) != own).then_some(span)
            })
            .collect()
    }

    /// The node's text joined with each long sibling that does not belong to
    /// another verse.
    fn sibling_spans(&self, node: ElementRef<'_>, text: &str, numbers: VerseNumbers) -> Vec<String> {
        let verses = numbers.verses();
        sibling_elements(node)
            .into_iter()
            .filter_map(|sibling| {
                let sibling_text = flatten_text(sibling);
                if char_len(&sibling_text) <= MIN_CONTEXT_CHARS {
                    return None;
                }
                let foreign = self.resolver.contains_label(&sibling_text)
                    && !verses
                        .iter()
                        .any(|v| self.resolver.label_span(&sibling_text, *v).is_some());
                (!foreign).then(|| format!("{text}\n{sibling_text}"))
            })
            .collect()
    }

    /// Page-wide alternative pass with sequential numbering.
    fn scan_page(&self, doc: &Html, locator: &ChapterLocator) -> Vec<VerseRecord> {
        self.locator
            .scan_page(doc)
            .into_iter()
            .zip(1..=PAGE_SCAN_LIMIT)
            .map(|(node, verse)| {
                let text = flatten_text(node);
                let content = self.extractor.extract_all(&Scope::node(node, &text));
                self.splitter.record(
                    locator,
                    verse,
                    content,
                    ExtractionMethod::PageScan,
                    char_len(&clean_text(&text)),
                    None,
                )
            })
            .collect()
    }

    /// Attach warnings and log chapter statistics.
    fn finish(&self, extraction: &mut ChapterExtraction) {
        let locator = extraction.locator.clone();
        let stats = extraction.stats();
        let degraded = extraction.degraded_count();

        if extraction.records.is_empty() {
            tracing::warn!(chapter = %locator, "no verses extracted");
            extraction.warnings.push("no verses extracted".to_string());
        }
        if degraded > 0 {
            extraction
                .warnings
                .push(format!("{degraded} verses below quality threshold"));
        }
        if let Some(hint) = locator.verse_count_hint {
            if hint as usize > extraction.records.len() {
                let message = format!(
                    "expected {hint} verses, extracted {}",
                    extraction.records.len()
                );
                tracing::warn!(chapter = %locator, "{message}");
                extraction.warnings.push(message);
            }
        }

        tracing::info!(
            work = %self.work.id,
            chapter = %locator,
            total = stats.total,
            accepted = extraction.accepted_count(),
            degraded,
            skipped = extraction.skipped_nodes,
            with_source_text = stats.with_source_text,
            with_translation = stats.with_translation,
            with_transliteration = stats.with_transliteration,
            with_short_transliteration = stats.with_short_transliteration,
            with_gloss = stats.with_gloss,
            merged = stats.merged,
            "chapter assembled"
        );
    }
}

/// Best record per verse of one chapter.
///
/// Records arrive in batches, one batch per located node or verse page. A
/// single record replaces an existing one only when it scores strictly
/// higher. A merged group is weighed as a unit: it takes all its verses when
/// it beats every record it overlaps, otherwise it only fills verses still
/// missing. Group members left behind by either rule lose their merge info,
/// so every surviving group covers exactly the verses it lists.
#[derive(Debug, Default)]
pub(crate) struct BestRecords {
    records: BTreeMap<u32, VerseRecord>,
}

impl BestRecords {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add the records of one batch.
    pub(crate) fn insert_batch(&mut self, batch: Vec<VerseRecord>) {
        let mut groups: BTreeMap<String, Vec<VerseRecord>> = BTreeMap::new();
        for record in batch {
            match record.merge.as_ref().map(|m| m.group_id.clone()) {
                Some(group_id) => groups.entry(group_id).or_default().push(record),
                None => self.insert_single(record),
            }
        }
        for members in groups.into_values() {
            self.insert_group(members);
        }
    }

    fn insert_single(&mut self, record: VerseRecord) {
        match self.records.get(&record.id.verse) {
            Some(existing) if existing.quality.score >= record.quality.score => {
                tracing::debug!(verse = record.id.verse, "duplicate verse dropped");
            }
            _ => {
                self.records.insert(record.id.verse, record);
            }
        }
    }

    fn insert_group(&mut self, members: Vec<VerseRecord>) {
        let score = members.iter().map(|r| r.quality.score).max().unwrap_or_default();
        let wins = members.iter().all(|member| {
            self.records
                .get(&member.id.verse)
                .map_or(true, |existing| existing.quality.score < score)
        });

        for member in members {
            if wins || !self.records.contains_key(&member.id.verse) {
                self.records.insert(member.id.verse, member);
            } else {
                tracing::debug!(verse = member.id.verse, "duplicate merged verse dropped");
            }
        }
    }

    /// Records in verse order, with partial groups unlinked.
    pub(crate) fn into_records(mut self) -> Vec<VerseRecord> {
        let mut present: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for record in self.records.values() {
            if let Some(merge) = &record.merge {
                present
                    .entry(merge.group_id.clone())
                    .or_default()
                    .push(record.id.verse);
            }
        }

        for record in self.records.values_mut() {
            let partial = record.merge.as_ref().is_some_and(|merge| {
                present
                    .get(&merge.group_id)
                    .is_some_and(|verses| *verses != merge.verses)
            });
            if partial {
                tracing::debug!(verse = record.id.verse, "merged group split by duplicates");
                record.merge = None;
            }
        }

        self.records.into_values().collect()
    }
}
