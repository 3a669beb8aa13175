//! Text normalization helpers shared by the extraction strategies.

use unicode_normalization::UnicodeNormalization;

/// Precomposed letters used by IAST-style transliteration.
pub const TRANSLITERATION_DIACRITICS: &str =
    "āīūṛṝḷḹēōṃḥṅñṭḍṇśṣĀĪŪṚṜḶḸĒŌṂḤṄÑṬḌṆŚṢ";

/// Check whether a character is a Unicode combining diacritical mark.
///
/// Cyrillic transliteration has no precomposed forms for most letters, so
/// marks such as U+0304 (macron) or U+0323 (dot below) stay decomposed even
/// after NFC normalization.
#[must_use]
pub fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Check whether text carries at least one transliteration diacritic.
///
/// # Examples
/// ```
/// use verse_harvester::text::has_diacritics;
///
/// assert!(has_diacritics("dharma-kṣetre"));
/// assert!(has_diacritics("дхр̣тара̄шт̣ра"));
/// assert!(!has_diacritics("plain text"));
/// ```
#[must_use]
pub fn has_diacritics(text: &str) -> bool {
    text.chars()
        .any(|c| is_combining_mark(c) || TRANSLITERATION_DIACRITICS.contains(c))
}

/// Length in Unicode scalar values, which is what the shape thresholds count.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapse whitespace, replace non-breaking spaces and normalize to NFC.
///
/// # Examples
/// ```
/// use verse_harvester::text::clean_text;
///
/// assert_eq!(clean_text("  a\u{a0}\n  b\t c "), "a b c");
/// assert_eq!(clean_text(""), "");
/// ```
#[must_use]
pub fn clean_text(text: &str) -> String {
    let collapsed = text
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapsed.nfc().collect()
}

/// Remove separator punctuation left over after a label was cut away.
#[must_use]
pub fn strip_leading_separators(text: &str) -> &str {
    text.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | '-' | '–' | '—' | '.' | '\u{a0}')
    })
}

/// Strip a label from the start of text, case-insensitively.
///
/// Returns the text unchanged if it does not start with the label.
///
/// # Examples
/// ```
/// use verse_harvester::text::strip_label_prefix;
///
/// assert_eq!(strip_label_prefix("Перевод: Дхритараштра сказал", "перевод"), "Дхритараштра сказал");
/// assert_eq!(strip_label_prefix("Translation", "purport"), "Translation");
/// ```
#[must_use]
pub fn strip_label_prefix<'a>(text: &'a str, label: &str) -> &'a str {
    if label.is_empty() {
        return text;
    }
    let trimmed = text.trim_start();
    let mut text_chars = trimmed.char_indices();
    for label_char in label.chars() {
        match text_chars.next() {
            Some((_, c)) if c.to_lowercase().eq(label_char.to_lowercase()) => {}
            _ => return text,
        }
    }
    let rest = match text_chars.next() {
        // Label is only a prefix of a longer word
        Some((_, c)) if c.is_alphanumeric() => return text,
        Some((idx, _)) => &trimmed[idx..],
        None => "",
    };
    strip_leading_separators(rest)
}

/// Count whitespace-separated words.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Shorten text for log output.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if char_len(text) > max_chars {
        out.push('…');
    }
    out
}
