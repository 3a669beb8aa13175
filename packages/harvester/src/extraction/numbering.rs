//! Verse number resolution from node text and attributes.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::config::{LabelVocabulary, MAX_MERGED_SPAN};
use crate::error::Result;
use crate::html::ancestor_elements;

/// "chapter.verse" references such as "1.16".
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DOTTED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\.(\d+)\b").expect("valid regex"));

/// First bare integer.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BARE_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));

/// Identifier attributes such as `id="verse-12"` or `id="12"`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ID_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:[a-z]+[-_]?)?(\d+)$").expect("valid regex"));

/// Attributes that may carry a verse number directly.
const NUMBER_ATTRIBUTES: &[&str] = &["data-verse", "data-number"];

/// Verse numbers a node is labeled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerseNumbers {
    /// One verse.
    Single(u32),
    /// A merged block covering `start..=end`.
    Range(u32, u32),
}

impl VerseNumbers {
    /// Expand into the full ascending sequence.
    #[must_use]
    pub fn verses(&self) -> Vec<u32> {
        match *self {
            Self::Single(n) => vec![n],
            Self::Range(start, end) => (start..=end).collect(),
        }
    }

    /// Lowest verse number.
    #[must_use]
    pub fn first(&self) -> u32 {
        match *self {
            Self::Single(n) | Self::Range(n, _) => n,
        }
    }

    /// Whether the numbers describe a merged block.
    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(..))
    }
}

/// Resolves the verse number(s) a candidate node is labeled with.
///
/// Patterns are compiled once from the work's label vocabulary. Resolution
/// order for text: range label, single label, "chapter.verse", first bare
/// integer. Attributes are consulted only when the text yields nothing.
#[derive(Debug, Clone)]
pub struct VerseNumberResolver {
    range_pattern: Regex,
    single_pattern: Regex,
    label_pattern: Regex,
}

impl VerseNumberResolver {
    /// Build a resolver for the given vocabulary.
    pub fn new(labels: &LabelVocabulary) -> Result<Self> {
        let mut words: Vec<&str> = labels
            .verse_labels
            .iter()
            .map(String::as_str)
            .filter(|w| !w.is_empty())
            .collect();
        // Longest first so "ТЕКСТЫ" wins over "ТЕКСТ"
        words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
        let alternation = if words.is_empty() {
            // Never matches
            r"[^\s\S]".to_string()
        } else {
            words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|")
        };

        Ok(Self {
            range_pattern: Regex::new(&format!(
                r"(?i)\b(?:{alternation})\s*[:.]?\s*(\d+)\s*[-–—]\s*(\d+)\b"
            ))?,
            single_pattern: Regex::new(&format!(r"(?i)\b(?:{alternation})\s*[:.]?\s*(\d+)\b"))?,
            label_pattern: Regex::new(&format!(r"(?i)\b(?:{alternation})\s*[:.]?\s*\d+"))?,
        })
    }

    /// Resolve verse numbers from text alone.
    ///
    /// # Examples
    /// ```
    /// use verse_harvester::config::russian_vedabase_labels;
    /// use verse_harvester::extraction::{VerseNumberResolver, VerseNumbers};
    ///
    /// let resolver = VerseNumberResolver::new(&russian_vedabase_labels()).unwrap();
    /// assert_eq!(resolver.resolve_text("ТЕКСТЫ 16-18"), Some(VerseNumbers::Range(16, 18)));
    /// assert_eq!(resolver.resolve_text("ТЕКСТ 5"), Some(VerseNumbers::Single(5)));
    /// assert_eq!(resolver.resolve_text("без номера"), None);
    /// ```
    #[must_use]
    pub fn resolve_text(&self, text: &str) -> Option<VerseNumbers> {
        let single = self.single_pattern.captures(text);
        let single_start = single
            .as_ref()
            .and_then(|c| c.get(0))
            .map(|m| m.start());

        if let Some(caps) = self.range_pattern.captures(text) {
            let range_start = caps.get(0).map(|m| m.start()).unwrap_or(usize::MAX);
            // A label earlier in the text takes precedence over a later range
            if single_start.map_or(true, |s| range_start <= s) {
                if let Some(range) = parse_range(caps.get(1), caps.get(2)) {
                    return Some(range);
                }
                tracing::debug!(
                    label = caps.get(0).map(|m| m.as_str()).unwrap_or_default(),
                    "malformed range label, falling back to single number"
                );
            }
        }

        if let Some(n) = single.and_then(|c| positive(c.get(1))) {
            return Some(VerseNumbers::Single(n));
        }

        if let Some(n) = DOTTED_PATTERN
            .captures(text)
            .and_then(|c| positive(c.get(2)))
        {
            return Some(VerseNumbers::Single(n));
        }

        BARE_NUMBER_PATTERN
            .captures_iter(text)
            .find_map(|c| positive(c.get(1)))
            .map(VerseNumbers::Single)
    }

    /// Resolve verse numbers from a node's text, falling back to
    /// `data-verse`/`data-number`/`id` attributes on the node and its
    /// ancestors.
    #[must_use]
    pub fn resolve(&self, element: Option<ElementRef<'_>>, text: &str) -> Option<VerseNumbers> {
        self.resolve_text(text)
            .or_else(|| element.and_then(number_from_attributes))
    }

    /// Byte range of the label introducing the given verse, if present.
    #[must_use]
    pub fn label_span(&self, text: &str, verse: u32) -> Option<Range<usize>> {
        self.label_pattern.find_iter(text).find_map(|m| {
            self.resolve_text(&text[m.start()..])
                .filter(|numbers| numbers.verses().contains(&verse))
                .map(|_| m.range())
        })
    }

    /// Byte offset of the first verse label at or after `from`.
    #[must_use]
    pub fn next_label(&self, text: &str, from: usize) -> Option<usize> {
        text.get(from..)
            .and_then(|rest| self.label_pattern.find(rest))
            .map(|m| from + m.start())
    }

    /// Whether text starts with a verse label.
    #[must_use]
    pub fn starts_with_label(&self, text: &str) -> bool {
        self.label_pattern
            .find(text.trim_start())
            .is_some_and(|m| m.start() == 0)
    }

    /// Whether text contains a verse label anywhere.
    #[must_use]
    pub fn contains_label(&self, text: &str) -> bool {
        self.label_pattern.is_match(text)
    }
}

fn positive(m: Option<regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

fn parse_range(start: Option<regex::Match<'_>>, end: Option<regex::Match<'_>>) -> Option<VerseNumbers> {
    let start = positive(start)?;
    let end = positive(end)?;
    (start < end && end - start < MAX_MERGED_SPAN).then_some(VerseNumbers::Range(start, end))
}

fn number_from_attributes(element: ElementRef<'_>) -> Option<VerseNumbers> {
    std::iter::once(element)
        .chain(ancestor_elements(element))
        .find_map(|el| {
            let value = el.value();
            NUMBER_ATTRIBUTES
                .iter()
                .find_map(|attr| value.attr(attr))
                .and_then(|v| v.trim().parse::<u32>().ok())
                .or_else(|| {
                    value
                        .attr("id")
                        .and_then(|id| ID_NUMBER_PATTERN.captures(id.trim()))
                        .and_then(|c| positive(c.get(1)))
                })
                .filter(|n| *n > 0)
        })
        .map(VerseNumbers::Single)
}
