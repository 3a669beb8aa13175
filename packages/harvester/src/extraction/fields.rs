//! Field extraction: an ordered chain of named strategies per semantic field.
//!
//! Each strategy looks at a [`Scope`] (an optional DOM node plus its
//! flattened text) and proposes a value for one [`Field`]. The
//! [`FieldExtractor`] tries strategies in order and keeps the first value that
//! passes the field's shape check; a value failing the check counts as a miss.
//!
//! Default order:
//! 1. [`MarkerNodeStrategy`]: descendant node tagged with a field marker class
//! 2. [`LabelSplitStrategy`]: text after a section label, up to the next label
//! 3. [`PatternSearchStrategy`]: character-class search over the whole text

use scraper::ElementRef;

use crate::config::WorkConfig;
use crate::html::{flatten_text, has_class_containing, non_empty_lines, outermost};
use crate::text::{char_len, clean_text, has_diacritics, strip_label_prefix};
use crate::types::{Field, VerseContent};

/// Minimum number of "word — meaning" pairs for a line to look like a gloss.
const MIN_GLOSS_PAIRS: usize = 2;

/// Text span a strategy works on.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Node the text came from; `None` for text-only extraction.
    pub element: Option<ElementRef<'a>>,
    /// Flattened text with line breaks at block boundaries.
    pub text: &'a str,
}

impl<'a> Scope<'a> {
    /// Scope over a DOM node.
    #[must_use]
    pub fn node(element: ElementRef<'a>, text: &'a str) -> Self {
        Self {
            element: Some(element),
            text,
        }
    }

    /// Scope over plain text, ignoring structural hints.
    #[must_use]
    pub fn text_only(text: &'a str) -> Self {
        Self {
            element: None,
            text,
        }
    }
}

/// A named way of extracting a field value.
pub trait FieldStrategy {
    /// Strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Propose a value for `field`, or `None` when the strategy does not apply.
    fn extract(&self, scope: &Scope<'_>, field: Field, work: &WorkConfig) -> Option<String>;
}

/// Check a candidate value against the field's shape rules.
///
/// # Examples
/// ```
/// use verse_harvester::config::bhagavad_gita;
/// use verse_harvester::extraction::is_shape_valid;
/// use verse_harvester::types::Field;
///
/// let bg = bhagavad_gita();
/// assert!(is_shape_valid(Field::SourceText, "धर्मक्षेत्रे कुरुक्षेत्रे", &bg));
/// assert!(!is_shape_valid(Field::Translation, "Коротко", &bg));
/// ```
#[must_use]
pub fn is_shape_valid(field: Field, value: &str, work: &WorkConfig) -> bool {
    let value = value.trim();
    let len = char_len(value);
    match field {
        Field::SourceText => len > 10 && work.source_script.is_present_in(value),
        Field::Translation => len > 20 && work.has_target_letters(value),
        Field::Transliteration => len > 10 && has_diacritics(value),
        Field::Gloss => len > 10,
        Field::Commentary => len > 20,
    }
}

/// Strip the longest matching label from the start of a line.
///
/// Returns `None` when no label matches.
fn after_label<'l>(line: &'l str, labels: &[String]) -> Option<&'l str> {
    labels
        .iter()
        .filter(|label| !label.is_empty())
        .filter_map(|label| {
            let rest = strip_label_prefix(line, label);
            (rest.len() != line.len()).then_some((char_len(label), rest))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, rest)| rest)
}

/// Whether a line starts with a verse label followed by a number.
fn starts_with_verse_label(line: &str, work: &WorkConfig) -> bool {
    work.labels.verse_labels.iter().any(|label| {
        let rest = strip_label_prefix(line, label);
        rest.len() != line.len() && rest.starts_with(|c: char| c.is_ascii_digit())
    })
}

/// Whether a line starts with the section label of another field.
fn starts_other_section(line: &str, field: Field, work: &WorkConfig) -> bool {
    Field::ALL
        .iter()
        .filter(|f| **f != field)
        .any(|f| after_label(line, work.labels.sections.for_field(*f)).is_some())
}

fn starts_any_label(line: &str, work: &WorkConfig) -> bool {
    starts_with_verse_label(line, work)
        || Field::ALL
            .iter()
            .any(|f| after_label(line, work.labels.sections.for_field(*f)).is_some())
}

fn starts_uppercase(line: &str) -> bool {
    line.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_uppercase)
}

fn gloss_pairs(line: &str) -> usize {
    line.chars().filter(|c| matches!(c, '—' | '–')).count()
}

fn is_transliteration_line(line: &str, work: &WorkConfig) -> bool {
    let lower = line.to_lowercase();
    has_diacritics(line)
        && !work.source_script.is_present_in(line)
        && gloss_pairs(line) < MIN_GLOSS_PAIRS
        && !starts_with_verse_label(line, work)
        && !work
            .labels
            .stop_words
            .iter()
            .any(|w| lower.contains(&w.to_lowercase()))
}

fn source_script_text(text: &str, work: &WorkConfig) -> Option<String> {
    let lines: Vec<String> = work
        .source_script
        .runs(text)
        .iter()
        .flat_map(|run| non_empty_lines(run))
        .collect();
    non_empty(lines.join("\n"))
}

fn without_source_script(text: &str, work: &WorkConfig) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !work.source_script.contains(*c))
        .collect();
    clean_text(&stripped)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Turn the raw lines of a field section into the field's normalized value.
fn refine(field: Field, lines: &[String], work: &WorkConfig) -> Option<String> {
    match field {
        Field::SourceText => source_script_text(&lines.join("\n"), work),
        Field::Transliteration => non_empty(
            lines
                .iter()
                .filter(|line| is_transliteration_line(line, work))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Field::Translation => non_empty(without_source_script(&lines.join(" "), work)),
        Field::Gloss => non_empty(clean_text(&lines.join(" "))),
        Field::Commentary => non_empty(lines.join("\n")),
    }
}

/// Classify a node by its marker classes, preferring the longest matching
/// marker ("verse-text" beats "verse").
fn marker_field(element: ElementRef<'_>, work: &WorkConfig) -> Option<Field> {
    work.labels
        .markers
        .iter()
        .filter(|(_, marker)| !marker.is_empty() && has_class_containing(element, marker))
        .max_by_key(|(_, marker)| char_len(marker))
        .map(|(field, _)| field)
}

/// Takes the text of descendant nodes tagged with a field marker class.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerNodeStrategy;

impl FieldStrategy for MarkerNodeStrategy {
    fn name(&self) -> &'static str {
        "marker_node"
    }

    fn extract(&self, scope: &Scope<'_>, field: Field, work: &WorkConfig) -> Option<String> {
        let element = scope.element?;
        let marked: Vec<ElementRef<'_>> = element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| marker_field(*el, work) == Some(field))
            .collect();
        if marked.is_empty() {
            return None;
        }

        let labels = work.labels.sections.for_field(field);
        let mut lines = Vec::new();
        for node in outermost(&marked) {
            for (idx, line) in non_empty_lines(&flatten_text(node)).into_iter().enumerate() {
                if idx == 0 {
                    if let Some(rest) = after_label(&line, labels) {
                        if !rest.is_empty() {
                            lines.push(rest.to_string());
                        }
                        continue;
                    }
                }
                lines.push(line);
            }
        }
        refine(field, &lines, work)
    }
}

/// Takes the text after a section label up to the next label of another
/// section or verse.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelSplitStrategy;

impl FieldStrategy for LabelSplitStrategy {
    fn name(&self) -> &'static str {
        "label_split"
    }

    fn extract(&self, scope: &Scope<'_>, field: Field, work: &WorkConfig) -> Option<String> {
        let labels = work.labels.sections.for_field(field);
        let lines = non_empty_lines(scope.text);

        let (start, first) = lines
            .iter()
            .enumerate()
            .find_map(|(idx, line)| section_start(line, field, work).map(|rest| (idx, rest)))?;

        let mut section = Vec::new();
        if !first.is_empty() {
            section.push(first.to_string());
        }
        section.extend(
            lines[start + 1..]
                .iter()
                .take_while(|line| {
                    !starts_other_section(line, field, work) && !starts_with_verse_label(line, work)
                })
                .cloned(),
        );
        refine(field, &section, work)
    }
}

/// Remainder of a line opening the field's section.
///
/// A longer label of another field owns the line, so a translation label
/// never opens on a line that really starts a gloss section.
fn section_start<'l>(line: &'l str, field: Field, work: &WorkConfig) -> Option<&'l str> {
    let rest = after_label(line, work.labels.sections.for_field(field))?;
    let shadowed = Field::ALL
        .iter()
        .filter(|f| **f != field)
        .filter_map(|f| after_label(line, work.labels.sections.for_field(*f)))
        .any(|other| other.len() < rest.len());
    (!shadowed).then_some(rest)
}

/// Character-class search over the whole text, ignoring structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSearchStrategy;

impl FieldStrategy for PatternSearchStrategy {
    fn name(&self) -> &'static str {
        "pattern_search"
    }

    fn extract(&self, scope: &Scope<'_>, field: Field, work: &WorkConfig) -> Option<String> {
        match field {
            Field::SourceText => work
                .source_script
                .runs(scope.text)
                .into_iter()
                .max_by_key(|run| work.source_script.count_in(run))
                .and_then(|run| source_script_text(&run, work)),
            Field::Transliteration => longest_transliteration_run(scope.text, work),
            Field::Translation => non_empty_lines(scope.text)
                .into_iter()
                .find(|line| {
                    char_len(line) > 20
                        && starts_uppercase(line)
                        && work.has_target_letters(line)
                        && !has_diacritics(line)
                        && !work.source_script.is_present_in(line)
                        && gloss_pairs(line) < MIN_GLOSS_PAIRS
                        && !starts_any_label(line, work)
                }),
            Field::Gloss => non_empty_lines(scope.text)
                .into_iter()
                .find(|line| gloss_pairs(line) >= MIN_GLOSS_PAIRS && !starts_any_label(line, work)),
            Field::Commentary => None,
        }
    }
}

fn longest_transliteration_run(text: &str, work: &WorkConfig) -> Option<String> {
    let lines = non_empty_lines(text);
    let mut best: &[String] = &[];
    let mut start = 0;
    for idx in 0..=lines.len() {
        let in_run = lines
            .get(idx)
            .is_some_and(|line| is_transliteration_line(line, work));
        if !in_run {
            if idx - start > best.len() {
                best = &lines[start..idx];
            }
            start = idx + 1;
        }
    }
    non_empty(best.join("\n"))
}

/// Applies an ordered list of strategies per field.
pub struct FieldExtractor<'w> {
    work: &'w WorkConfig,
    strategies: Vec<Box<dyn FieldStrategy>>,
}

impl<'w> FieldExtractor<'w> {
    /// Create an extractor with the default strategy order.
    #[must_use]
    pub fn new(work: &'w WorkConfig) -> Self {
        Self::with_strategies(
            work,
            vec![
                Box::new(MarkerNodeStrategy),
                Box::new(LabelSplitStrategy),
                Box::new(PatternSearchStrategy),
            ],
        )
    }

    /// Create an extractor with a custom strategy order.
    #[must_use]
    pub fn with_strategies(work: &'w WorkConfig, strategies: Vec<Box<dyn FieldStrategy>>) -> Self {
        Self { work, strategies }
    }

    /// Work configuration this extractor is tuned to.
    #[must_use]
    pub fn work(&self) -> &'w WorkConfig {
        self.work
    }

    /// Extract one field: the first shape-valid strategy result.
    #[must_use]
    pub fn extract(&self, scope: &Scope<'_>, field: Field) -> Option<String> {
        for strategy in &self.strategies {
            let Some(value) = strategy.extract(scope, field, self.work) else {
                continue;
            };
            if is_shape_valid(field, &value, self.work) {
                tracing::debug!(
                    field = %field,
                    strategy = strategy.name(),
                    chars = char_len(&value),
                    "field extracted"
                );
                return Some(value);
            }
            tracing::debug!(
                field = %field,
                strategy = strategy.name(),
                chars = char_len(&value),
                "candidate failed shape check"
            );
        }
        None
    }

    /// Extract every field from a scope.
    #[must_use]
    pub fn extract_all(&self, scope: &Scope<'_>) -> VerseContent {
        Field::ALL
            .iter()
            .fold(VerseContent::default(), |content, field| {
                content.with(*field, self.extract(scope, *field))
            })
    }

    /// Extract every field from a node.
    #[must_use]
    pub fn extract_node(&self, element: ElementRef<'_>) -> VerseContent {
        let text = flatten_text(element);
        self.extract_all(&Scope::node(element, &text))
    }

    /// Extract every field from plain text, ignoring structural hints.
    #[must_use]
    pub fn extract_text_only(&self, text: &str) -> VerseContent {
        self.extract_all(&Scope::text_only(text))
    }
}

impl std::fmt::Debug for FieldExtractor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldExtractor")
            .field("work", &self.work.id)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
