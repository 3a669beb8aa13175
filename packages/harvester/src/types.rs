//! Core data types for the harvester.
//!
//! A [`VerseRecord`] is built once per (node, verse number) pair and never
//! patched afterwards: when a record scores too low, the assembler builds a
//! fresh one from the next fallback strategy instead.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::char_len;

/// Semantic fields of a verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The verse in its original script.
    SourceText,
    /// Romanized/Cyrillic rendering with diacritics.
    Transliteration,
    /// Word-by-word translation.
    Gloss,
    /// Full translation into the target language.
    Translation,
    /// Commentary (purport).
    Commentary,
}

impl Field {
    /// All fields in page order.
    pub const ALL: [Field; 5] = [
        Field::SourceText,
        Field::Transliteration,
        Field::Gloss,
        Field::Translation,
        Field::Commentary,
    ];

    /// Get the snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceText => "source_text",
            Self::Transliteration => "transliteration",
            Self::Gloss => "gloss",
            Self::Translation => "translation",
            Self::Commentary => "commentary",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Field strategies applied to the located node.
    Structured,
    /// Shared content replicated from a merged block.
    MergedBlock,
    /// Text of an ancestor node, starting at the verse label.
    ParentContext,
    /// Text of a sibling node.
    SiblingContext,
    /// Every field re-extracted from the node's full text.
    FragmentReconstruction,
    /// Page-wide scan with sequential numbering.
    PageScan,
}

impl ExtractionMethod {
    /// Get the snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::MergedBlock => "merged_block",
            Self::ParentContext => "parent_context",
            Self::SiblingContext => "sibling_context",
            Self::FragmentReconstruction => "fragment_reconstruction",
            Self::PageScan => "page_scan",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted content fields; any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerseContent {
    pub source_text: Option<String>,
    pub transliteration: Option<String>,
    pub gloss: Option<String>,
    pub translation: Option<String>,
    pub commentary: Option<String>,
}

impl VerseContent {
    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::SourceText => self.source_text.as_deref(),
            Field::Transliteration => self.transliteration.as_deref(),
            Field::Gloss => self.gloss.as_deref(),
            Field::Translation => self.translation.as_deref(),
            Field::Commentary => self.commentary.as_deref(),
        }
    }

    /// Return a copy with one field replaced.
    #[must_use]
    pub fn with(mut self, field: Field, value: Option<String>) -> Self {
        let slot = match field {
            Field::SourceText => &mut self.source_text,
            Field::Transliteration => &mut self.transliteration,
            Field::Gloss => &mut self.gloss,
            Field::Translation => &mut self.translation,
            Field::Commentary => &mut self.commentary,
        };
        *slot = value;
        self
    }

    /// True when no field was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Identity of a verse; the persistence upsert key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerseId {
    pub work: String,
    pub division: Option<u32>,
    pub chapter: u32,
    pub verse: u32,
    pub language: String,
}

impl fmt::Display for VerseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.division {
            Some(d) => write!(f, "{} {d}.{}.{}", self.work, self.chapter, self.verse),
            None => write!(f, "{} {}.{}", self.work, self.chapter, self.verse),
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// URL of the verse on its source page.
    pub url: String,
    /// Extraction path that produced the record.
    pub method: ExtractionMethod,
    /// Character length of the originating node's text.
    pub raw_text_length: usize,
}

/// Linkage between records produced from one merged block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInfo {
    /// Identifier shared by all records of the block.
    pub group_id: String,
    /// Every verse number the block covers.
    pub verses: Vec<u32>,
}

/// Outcome of the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    /// Score reached the threshold.
    Accepted,
    /// Score below threshold; the record is kept but flagged.
    Degraded,
}

/// A single finding of the quality scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    /// Field absent.
    Missing(Field),
    /// Field present but failing its shape check.
    Invalid(Field),
    /// Transliteration valid but only 11-20 characters long.
    ShortTransliteration { chars: usize },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{field} missing"),
            Self::Invalid(field) => write!(f, "{field} failed shape check"),
            Self::ShortTransliteration { chars } => {
                write!(f, "transliteration too short ({chars} chars)")
            }
        }
    }
}

/// Composite quality score and the issues that lowered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    pub score: u8,
    pub grade: QualityGrade,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    /// Whether the record passed the quality gate.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.grade == QualityGrade::Accepted
    }
}

/// One extracted verse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseRecord {
    pub id: VerseId,
    pub content: VerseContent,
    pub provenance: Provenance,
    /// Present when the record came from a merged block.
    pub merge: Option<MergeInfo>,
    pub quality: QualityReport,
}

impl VerseRecord {
    /// Whether the record is part of a merged block.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.merge.is_some()
    }

    /// Verse numbers covered by the originating block (just this verse when
    /// not merged).
    #[must_use]
    pub fn merged_with(&self) -> Vec<u32> {
        self.merge
            .as_ref()
            .map(|m| m.verses.clone())
            .unwrap_or_else(|| vec![self.id.verse])
    }

    /// Whether the record passed the quality gate.
    #[must_use]
    pub fn passes_quality_gate(&self) -> bool {
        self.quality.is_accepted()
    }
}

/// Input locator for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLocator {
    pub work: String,
    pub division: Option<u32>,
    pub chapter: u32,
    /// Expected verse count, when the caller knows it.
    pub verse_count_hint: Option<u32>,
}

impl ChapterLocator {
    /// Create a locator for a chapter of a flat work.
    #[must_use]
    pub fn new(work: impl Into<String>, chapter: u32) -> Self {
        Self {
            work: work.into(),
            division: None,
            chapter,
            verse_count_hint: None,
        }
    }

    /// Set the outer division.
    #[must_use]
    pub fn with_division(mut self, division: Option<u32>) -> Self {
        self.division = division;
        self
    }

    /// Set the verse count hint.
    #[must_use]
    pub fn with_verse_hint(mut self, hint: Option<u32>) -> Self {
        self.verse_count_hint = hint;
        self
    }
}

impl fmt::Display for ChapterLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.division {
            Some(d) => write!(f, "{} {d}.{}", self.work, self.chapter),
            None => write!(f, "{} {}", self.work, self.chapter),
        }
    }
}

/// Field coverage of a chapter's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChapterStats {
    pub total: usize,
    pub with_source_text: usize,
    pub with_translation: usize,
    pub with_transliteration: usize,
    pub with_short_transliteration: usize,
    pub with_gloss: usize,
    pub merged: usize,
}

impl ChapterStats {
    /// Compute coverage counts.
    #[must_use]
    pub fn from_records(records: &[VerseRecord]) -> Self {
        let len_of = |value: Option<&str>| value.map(|v| char_len(v.trim())).unwrap_or(0);
        let count = |pred: &dyn Fn(&VerseRecord) -> bool| records.iter().filter(|r| pred(r)).count();

        Self {
            total: records.len(),
            with_source_text: count(&|r| len_of(r.content.source_text.as_deref()) > 10),
            with_translation: count(&|r| len_of(r.content.translation.as_deref()) > 20),
            with_transliteration: count(&|r| len_of(r.content.transliteration.as_deref()) > 20),
            with_short_transliteration: count(&|r| {
                let len = len_of(r.content.transliteration.as_deref());
                len > 10 && len <= 20
            }),
            with_gloss: count(&|r| len_of(r.content.gloss.as_deref()) > 10),
            merged: count(&|r| r.is_merged()),
        }
    }
}

/// Everything extracted from one chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterExtraction {
    pub locator: ChapterLocator,
    /// URL of the page the records came from.
    pub url: String,
    /// False when the existence probe rejected the page.
    pub page_found: bool,
    /// Records ordered by verse number.
    pub records: Vec<VerseRecord>,
    /// Candidate nodes skipped because no verse number was found.
    pub skipped_nodes: usize,
    /// Non-fatal problems (structural failure, degraded verses, ...).
    pub warnings: Vec<String>,
}

impl ChapterExtraction {
    /// An extraction for a page the probe rejected.
    #[must_use]
    pub fn not_found(locator: ChapterLocator, url: impl Into<String>) -> Self {
        Self {
            locator,
            url: url.into(),
            page_found: false,
            records: Vec::new(),
            skipped_nodes: 0,
            warnings: Vec::new(),
        }
    }

    /// Number of records that passed the quality gate.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.records.iter().filter(|r| r.passes_quality_gate()).count()
    }

    /// Number of records kept despite failing the quality gate.
    #[must_use]
    pub fn degraded_count(&self) -> usize {
        self.records.len() - self.accepted_count()
    }

    /// Field coverage of the records.
    #[must_use]
    pub fn stats(&self) -> ChapterStats {
        ChapterStats::from_records(&self.records)
    }

    /// True when nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate result of a multi-chapter run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub work: String,
    pub started_at: DateTime<Utc>,
    pub duration: std::time::Duration,
    /// Completed chapters, ordered by (division, chapter).
    pub chapters: Vec<ChapterExtraction>,
    /// One entry per failed chapter or task.
    pub errors: Vec<String>,
    /// True when the run was cancelled before all tasks were issued.
    pub cancelled: bool,
}

impl RunResult {
    /// Total records across chapters.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.chapters.iter().map(|c| c.records.len()).sum()
    }

    /// Records that passed the quality gate.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.chapters.iter().map(ChapterExtraction::accepted_count).sum()
    }

    /// Records kept despite failing the quality gate.
    #[must_use]
    pub fn degraded_count(&self) -> usize {
        self.chapters.iter().map(ChapterExtraction::degraded_count).sum()
    }

    /// A run succeeds when it produced at least one record.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.total_records() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(verse: u32, content: VerseContent, grade: QualityGrade) -> VerseRecord {
        VerseRecord {
            id: VerseId {
                work: "bg".to_string(),
                division: None,
                chapter: 1,
                verse,
                language: "ru".to_string(),
            },
            content,
            provenance: Provenance {
                url: "url".to_string(),
                method: ExtractionMethod::Structured,
                raw_text_length: 100,
            },
            merge: None,
            quality: QualityReport {
                score: if grade == QualityGrade::Accepted { 4 } else { 2 },
                grade,
                issues: Vec::new(),
            },
        }
    }

    #[test]
    fn test_verse_content_with_and_get() {
        let content = VerseContent::default()
            .with(Field::Translation, Some("перевод".to_string()))
            .with(Field::Gloss, Some("слово".to_string()));
        assert_eq!(content.get(Field::Translation), Some("перевод"));
        assert_eq!(content.get(Field::Gloss), Some("слово"));
        assert_eq!(content.get(Field::Commentary), None);
        assert!(!content.is_empty());
        assert!(VerseContent::default().is_empty());
    }

    #[test]
    fn test_verse_id_display() {
        let id = VerseId {
            work: "sb".to_string(),
            division: Some(1),
            chapter: 2,
            verse: 3,
            language: "ru".to_string(),
        };
        assert_eq!(id.to_string(), "sb 1.2.3");
    }

    #[test]
    fn test_merged_with_defaults_to_own_verse() {
        let r = record(7, VerseContent::default(), QualityGrade::Accepted);
        assert_eq!(r.merged_with(), vec![7]);
        assert!(!r.is_merged());
    }

    #[test]
    fn test_chapter_stats() {
        let full = VerseContent {
            source_text: Some("धर्मक्षेत्रे कुरुक्षेत्रे".to_string()),
            transliteration: Some("dharma-kṣetre".to_string()),
            gloss: None,
            translation: Some("Дхритараштра сказал: О Санджая".to_string()),
            commentary: None,
        };
        let records = vec![
            record(1, full, QualityGrade::Accepted),
            record(2, VerseContent::default(), QualityGrade::Degraded),
        ];
        let stats = ChapterStats::from_records(&records);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_source_text, 1);
        assert_eq!(stats.with_translation, 1);
        assert_eq!(stats.with_transliteration, 0);
        assert_eq!(stats.with_short_transliteration, 1);
    }

    #[test]
    fn test_chapter_extraction_counts() {
        let extraction = ChapterExtraction {
            locator: ChapterLocator::new("bg", 1),
            url: "url".to_string(),
            page_found: true,
            records: vec![
                record(1, VerseContent::default(), QualityGrade::Accepted),
                record(2, VerseContent::default(), QualityGrade::Degraded),
                record(3, VerseContent::default(), QualityGrade::Accepted),
            ],
            skipped_nodes: 0,
            warnings: Vec::new(),
        };
        assert_eq!(extraction.accepted_count(), 2);
        assert_eq!(extraction.degraded_count(), 1);
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(ChapterLocator::new("bg", 2).to_string(), "bg 2");
        assert_eq!(
            ChapterLocator::new("sb", 2).with_division(Some(1)).to_string(),
            "sb 1.2"
        );
    }
}
