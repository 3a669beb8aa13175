//! Configuration constants, work definitions and validation functions.
//!
//! Every supported work is described by a [`WorkConfig`]: selector hints,
//! label vocabulary and script ranges that parameterize the single generic
//! extraction pipeline. Built-in configurations cover the vedabase.io
//! Russian library; others can be loaded from YAML.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HarvesterError, Result};
use crate::types::Field;

/// Base URL of the Russian vedabase.io library.
pub const VEDABASE_LIBRARY_URL: &str = "https://vedabase.io/ru/library";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Minimum composite score for a record to pass the quality gate.
pub const QUALITY_THRESHOLD: u8 = 4;

/// Upper bound of the composite quality score.
pub const MAX_QUALITY_SCORE: u8 = 5;

/// Candidate nodes shorter than this are never returned by the locator.
pub const MIN_NODE_CHARS: usize = 20;

/// Block-level fallback nodes longer than this are treated as page chrome.
pub const MAX_NODE_CHARS: usize = 2000;

/// Minimum text length of a verse unwrapped from a multi-verse container.
pub const MIN_WRAPPED_VERSE_CHARS: usize = 50;

/// Minimum text length for the secondary scan inside a multi-verse container.
pub const MIN_WRAPPER_SCAN_CHARS: usize = 100;

/// Minimum text length of an ancestor or sibling used for context search.
pub const MIN_CONTEXT_CHARS: usize = 100;

/// Runaway guard for the page-wide scan that numbers verses sequentially.
pub const PAGE_SCAN_LIMIT: u32 = 50;

/// Largest span accepted for a merged-range label such as "ТЕКСТЫ 16-18".
pub const MAX_MERGED_SPAN: u32 = 50;

/// Chapter probing stops after this many consecutive missing or empty chapters.
pub const MAX_CONSECUTIVE_EMPTY: u32 = 3;

/// Default number of chapter tasks running at the same time.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Hard cap on verse pages fetched for one chapter in per-verse layout.
pub const MAX_VERSE_PAGES: u32 = 200;

/// Work ID pattern: lowercase letters, digits and dashes.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WORK_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid regex"));

/// An inclusive Unicode code point range identifying a writing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRange {
    pub start: char,
    pub end: char,
}

impl ScriptRange {
    /// Devanagari block (U+0900..=U+097F).
    pub const DEVANAGARI: Self = Self::new('\u{0900}', '\u{097F}');

    /// Bengali block (U+0980..=U+09FF).
    pub const BENGALI: Self = Self::new('\u{0980}', '\u{09FF}');

    /// Basic Cyrillic block (U+0400..=U+04FF).
    pub const CYRILLIC: Self = Self::new('\u{0400}', '\u{04FF}');

    /// Create a new range.
    #[must_use]
    pub const fn new(start: char, end: char) -> Self {
        Self { start, end }
    }

    /// Check whether a character belongs to the range.
    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&c)
    }

    /// Check whether text contains at least one character of the range.
    #[must_use]
    pub fn is_present_in(&self, text: &str) -> bool {
        text.chars().any(|c| self.contains(c))
    }

    /// Count characters of the range in text.
    #[must_use]
    pub fn count_in(&self, text: &str) -> usize {
        text.chars().filter(|c| self.contains(*c)).count()
    }

    /// Collect maximal runs of script characters (and the whitespace between
    /// them) from text.
    ///
    /// # Examples
    /// ```
    /// use verse_harvester::config::ScriptRange;
    ///
    /// let runs = ScriptRange::DEVANAGARI.runs("ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे Перевод");
    /// assert_eq!(runs, vec!["धर्मक्षेत्रे कुरुक्षेत्रे".to_string()]);
    /// ```
    #[must_use]
    pub fn runs(&self, text: &str) -> Vec<String> {
        let mut runs = Vec::new();
        let mut current = String::new();
        let mut pending_space = String::new();

        for c in text.chars() {
            if self.contains(c) {
                if !current.is_empty() {
                    current.push_str(&pending_space);
                }
                pending_space.clear();
                current.push(c);
            } else if c.is_whitespace() && !current.is_empty() {
                pending_space.push(c);
            } else {
                pending_space.clear();
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

/// How a work's pages are organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    /// All verses of a chapter rendered on one page.
    PerChapter,
    /// One page per verse.
    PerVerse,
}

/// A top-level division above chapter level (canto, lila, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    /// 1-based division number.
    pub number: u32,
    /// Path segment used in URLs (e.g. "adi" or "1").
    pub slug: String,
    /// Human readable name.
    pub name: String,
    /// Upper bound of chapters to probe in this division.
    pub chapters: u32,
}

/// Per-field list of strings (labels or marker classes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldStrings {
    pub source_text: Vec<String>,
    pub transliteration: Vec<String>,
    pub gloss: Vec<String>,
    pub translation: Vec<String>,
    pub commentary: Vec<String>,
}

impl FieldStrings {
    /// Get the strings configured for a field.
    #[must_use]
    pub fn for_field(&self, field: Field) -> &[String] {
        match field {
            Field::SourceText => &self.source_text,
            Field::Transliteration => &self.transliteration,
            Field::Gloss => &self.gloss,
            Field::Translation => &self.translation,
            Field::Commentary => &self.commentary,
        }
    }

    /// Iterate over all `(field, string)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        Field::ALL.into_iter().flat_map(move |field| {
            self.for_field(field)
                .iter()
                .map(move |s| (field, s.as_str()))
        })
    }
}

/// Vocabulary used to recognize labels and markers on a page.
///
/// Every list may be omitted in a YAML work file and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelVocabulary {
    /// Words that label a verse number ("ТЕКСТ", "ТЕКСТЫ", "verse", ...).
    ///
    /// Plural forms are listed explicitly; matching is case-insensitive.
    pub verse_labels: Vec<String>,

    /// Section headings introducing each field ("Пословный перевод", ...).
    pub sections: FieldStrings,

    /// CSS class fragments marking a sub-node that holds a field.
    pub markers: FieldStrings,

    /// Keywords or class names that indicate a page renders verses.
    pub probe_indicators: Vec<String>,

    /// Words typical for navigation blocks rather than verses.
    pub navigation_words: Vec<String>,

    /// Ordinary words that disqualify a transliteration candidate.
    pub stop_words: Vec<String>,
}

/// Configuration of one scriptural work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkConfig {
    /// Short identifier (e.g. "bg").
    pub id: String,

    /// Display title.
    pub title: String,

    /// Language code of the target-language content.
    pub language: String,

    /// Base URL, ending with a slash.
    pub base_url: String,

    /// Page template family.
    pub layout: PageLayout,

    /// Number of chapters for works without divisions.
    #[serde(default)]
    pub chapters: u32,

    /// Outer divisions; empty for flat works.
    #[serde(default)]
    pub divisions: Vec<Division>,

    /// CSS selectors for verse containers, most specific first.
    pub selector_hints: Vec<String>,

    /// Selectors among the hints that match a multi-verse wrapper.
    #[serde(default)]
    pub wrapper_selectors: Vec<String>,

    /// Script of the original verse text.
    pub source_script: ScriptRange,

    /// Scripts of the target language (translation, gloss, commentary).
    pub target_scripts: Vec<ScriptRange>,

    /// Labels and marker classes.
    pub labels: LabelVocabulary,
}

impl WorkConfig {
    /// Load a work configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a work configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let work: Self = serde_yaml_ng::from_str(yaml)?;
        validate_work_id(&work.id)?;
        Ok(work)
    }

    /// Whether the work is organized into outer divisions.
    #[must_use]
    pub fn has_divisions(&self) -> bool {
        !self.divisions.is_empty()
    }

    /// Look up a division by number.
    #[must_use]
    pub fn division(&self, number: u32) -> Option<&Division> {
        self.divisions.iter().find(|d| d.number == number)
    }

    /// Check whether text contains target-language letters.
    #[must_use]
    pub fn has_target_letters(&self, text: &str) -> bool {
        text.chars()
            .any(|c| c.is_alphabetic() && self.target_scripts.iter().any(|s| s.contains(c)))
    }

    /// Upper bound of chapters for a division (or the whole work).
    pub fn max_chapters(&self, division: Option<u32>) -> Result<u32> {
        match division {
            None if !self.has_divisions() => Ok(self.chapters),
            Some(number) => self
                .division(number)
                .map(|d| d.chapters)
                .ok_or_else(|| self.invalid_division(number)),
            None => Err(HarvesterError::InvalidDivision {
                work: self.id.clone(),
                division: 0,
                max: Some(self.divisions.len() as u32),
            }),
        }
    }

    /// Validate a chapter locator against this work.
    pub fn validate_locator(&self, division: Option<u32>, chapter: u32) -> Result<()> {
        let max = self.max_chapters(division)?;
        validate_chapter(&self.id, chapter, max)
    }

    fn invalid_division(&self, division: u32) -> HarvesterError {
        HarvesterError::InvalidDivision {
            work: self.id.clone(),
            division,
            max: self.has_divisions().then(|| self.divisions.len() as u32),
        }
    }

    fn path_prefix(&self, division: Option<u32>) -> String {
        match division.and_then(|d| self.division(d)) {
            Some(d) => format!("{}{}/", self.base_url, d.slug),
            None => self.base_url.clone(),
        }
    }

    /// URL of a chapter page (per-chapter layout).
    ///
    /// # Examples
    /// ```
    /// use verse_harvester::config::find_work;
    ///
    /// let sb = find_work("sb").unwrap();
    /// assert_eq!(
    ///     sb.chapter_url(Some(1), 2),
    ///     "https://vedabase.io/ru/library/sb/1/2/advanced-view/"
    /// );
    /// ```
    #[must_use]
    pub fn chapter_url(&self, division: Option<u32>, chapter: u32) -> String {
        format!("{}{chapter}/advanced-view/", self.path_prefix(division))
    }

    /// URL of a single verse page (per-verse layout).
    #[must_use]
    pub fn verse_url(&self, division: Option<u32>, chapter: u32, verse: u32) -> String {
        format!("{}{chapter}/{verse}/", self.path_prefix(division))
    }

    /// URL stored on a record, pointing at the verse on its source page.
    #[must_use]
    pub fn record_url(&self, division: Option<u32>, chapter: u32, verse: u32) -> String {
        match self.layout {
            PageLayout::PerChapter => format!("{}#{verse}", self.chapter_url(division, chapter)),
            PageLayout::PerVerse => self.verse_url(division, chapter, verse),
        }
    }
}

/// Validate work ID format.
///
/// # Examples
/// ```
/// use verse_harvester::config::validate_work_id;
///
/// assert!(validate_work_id("bg").is_ok());
/// assert!(validate_work_id("Bad ID").is_err());
/// ```
pub fn validate_work_id(id: &str) -> Result<()> {
    if WORK_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(HarvesterError::InvalidWorkId(id.to_string()))
    }
}

/// Validate that a chapter number lies in `1..=max`.
pub fn validate_chapter(work: &str, chapter: u32, max: u32) -> Result<()> {
    if chapter >= 1 && chapter <= max {
        Ok(())
    } else {
        Err(HarvesterError::InvalidChapter {
            work: work.to_string(),
            chapter,
            max,
        })
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Label vocabulary of the Russian vedabase.io templates.
#[must_use]
pub fn russian_vedabase_labels() -> LabelVocabulary {
    LabelVocabulary {
        verse_labels: strings(&[
            "ТЕКСТЫ", "ТЕКСТ", "стихи", "стих", "verses", "verse", "texts", "text",
        ]),
        sections: FieldStrings {
            source_text: strings(&["Деванагари", "Бенгали"]),
            transliteration: strings(&["Текст стиха"]),
            gloss: strings(&["Пословный перевод"]),
            translation: strings(&["Перевод"]),
            commentary: strings(&["Комментарий"]),
        },
        markers: FieldStrings {
            source_text: strings(&["devanagari", "bengali"]),
            transliteration: strings(&["verse-text", "translit"]),
            gloss: strings(&["synonyms", "word-by-word"]),
            translation: strings(&["translation"]),
            commentary: strings(&["purport", "commentary"]),
        },
        probe_indicators: strings(&[
            "ТЕКСТ",
            "стих",
            "av-verses",
            "verse",
            "shloka",
            "devanagari",
            "translation",
            "purport",
        ]),
        navigation_words: strings(&[
            "глав",
            "chapter",
            "назад",
            "далее",
            "содержание",
            "menu",
        ]),
        stop_words: strings(&[
            "текст",
            "стих",
            "перевод",
            "комментарий",
            "деванагари",
            "синонимы",
            "глава",
            "пословный",
        ]),
    }
}

fn vedabase_selector_hints() -> Vec<String> {
    strings(&[
        ".av-verses",
        ".verse",
        ".shloka",
        "[class*=\"verse\"]",
        "[class*=\"shloka\"]",
    ])
}

/// Bhagavad-gita: 18 chapters, one page per chapter.
#[must_use]
pub fn bhagavad_gita() -> WorkConfig {
    WorkConfig {
        id: "bg".to_string(),
        title: "Бхагавад-гита".to_string(),
        language: "ru".to_string(),
        base_url: format!("{VEDABASE_LIBRARY_URL}/bg/"),
        layout: PageLayout::PerChapter,
        chapters: 18,
        divisions: Vec::new(),
        selector_hints: vedabase_selector_hints(),
        wrapper_selectors: strings(&[".av-verses"]),
        source_script: ScriptRange::DEVANAGARI,
        target_scripts: vec![ScriptRange::CYRILLIC],
        labels: russian_vedabase_labels(),
    }
}

/// Srimad-Bhagavatam: 12 cantos, one page per chapter.
#[must_use]
pub fn srimad_bhagavatam() -> WorkConfig {
    let divisions = (1..=12)
        .map(|number| Division {
            number,
            slug: number.to_string(),
            name: format!("Песнь {number}"),
            chapters: 50,
        })
        .collect();

    WorkConfig {
        id: "sb".to_string(),
        title: "Шримад-Бхагаватам".to_string(),
        language: "ru".to_string(),
        base_url: format!("{VEDABASE_LIBRARY_URL}/sb/"),
        layout: PageLayout::PerChapter,
        chapters: 0,
        divisions,
        selector_hints: vedabase_selector_hints(),
        wrapper_selectors: strings(&[".av-verses"]),
        source_script: ScriptRange::DEVANAGARI,
        target_scripts: vec![ScriptRange::CYRILLIC],
        labels: russian_vedabase_labels(),
    }
}

/// Sri Chaitanya-charitamrita: three lilas, verses in Bengali script.
#[must_use]
pub fn chaitanya_charitamrita() -> WorkConfig {
    let parts = [
        ("adi", "Ади-лила", 17),
        ("madhya", "Мадхья-лила", 25),
        ("antya", "Антья-лила", 20),
    ];
    let divisions = parts
        .iter()
        .zip(1..)
        .map(|((slug, name, chapters), number)| Division {
            number,
            slug: (*slug).to_string(),
            name: (*name).to_string(),
            chapters: *chapters,
        })
        .collect();

    WorkConfig {
        id: "cc".to_string(),
        title: "Шри Чайтанья-чаритамрита".to_string(),
        language: "ru".to_string(),
        base_url: format!("{VEDABASE_LIBRARY_URL}/cc/"),
        layout: PageLayout::PerChapter,
        chapters: 0,
        divisions,
        selector_hints: vedabase_selector_hints(),
        wrapper_selectors: strings(&[".av-verses"]),
        source_script: ScriptRange::BENGALI,
        target_scripts: vec![ScriptRange::CYRILLIC],
        labels: russian_vedabase_labels(),
    }
}

/// All built-in work configurations.
#[must_use]
pub fn builtin_works() -> Vec<WorkConfig> {
    vec![bhagavad_gita(), srimad_bhagavatam(), chaitanya_charitamrita()]
}

/// Find a built-in work by ID.
pub fn find_work(id: &str) -> Result<WorkConfig> {
    validate_work_id(id)?;
    builtin_works()
        .into_iter()
        .find(|w| w.id == id)
        .ok_or_else(|| HarvesterError::UnknownWork(id.to_string()))
}
