//! Utility functions for navigating and extracting text from HTML trees.

use scraper::{ElementRef, Selector};

use crate::error::{HarvesterError, Result};
use crate::text::clean_text;

/// Tags whose boundaries become line breaks in flattened text.
pub const BLOCK_TAGS: &[&str] = &[
    "div",
    "p",
    "section",
    "article",
    "li",
    "ul",
    "ol",
    "blockquote",
    "td",
    "tr",
    "table",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "footer",
    "dd",
    "dt",
];

/// Check whether a tag name is block-level.
#[must_use]
pub fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// Parse a CSS selector, mapping failures to [`HarvesterError::InvalidSelector`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| HarvesterError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

/// Get the text content of an element with line breaks at block boundaries.
///
/// `<br>` and block-level elements start a new line; inline elements are
/// concatenated as-is. Script and style contents are skipped.
///
/// # Examples
/// ```
/// use scraper::Html;
/// use verse_harvester::html::flatten_text;
///
/// let doc = Html::parse_fragment("<div><p>ТЕКСТ 1</p><p>Перевод <b>да</b></p></div>");
/// let text = flatten_text(doc.root_element());
/// let lines: Vec<_> = text.lines().filter(|l| !l.trim().is_empty()).collect();
/// assert_eq!(lines, vec!["ТЕКСТ 1", "Перевод да"]);
/// ```
#[must_use]
pub fn flatten_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            match name {
                "script" | "style" | "noscript" => {}
                "br" => out.push('\n'),
                _ if is_block_tag(name) => {
                    out.push('\n');
                    collect_text(child_element, out);
                    out.push('\n');
                }
                _ => collect_text(child_element, out),
            }
        }
    }
}

/// Get the whitespace-collapsed text of an element.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&flatten_text(element))
}

/// Split flattened text into cleaned, non-empty lines.
#[must_use]
pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Check whether any class token of the element contains a fragment
/// (case-insensitive).
#[must_use]
pub fn has_class_containing(element: ElementRef<'_>, fragment: &str) -> bool {
    let fragment = fragment.to_lowercase();
    element
        .value()
        .classes()
        .any(|class| class.to_lowercase().contains(&fragment))
}

/// Iterate over ancestor elements, nearest first.
pub fn ancestor_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

/// Sibling elements, previous ones first (nearest first), then following ones.
#[must_use]
pub fn sibling_elements(element: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .chain(element.next_siblings().filter_map(ElementRef::wrap))
        .collect()
}

/// Keep only elements that have no ancestor in the same list.
///
/// Document order is preserved.
#[must_use]
pub fn outermost<'a>(elements: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    elements
        .iter()
        .filter(|candidate| {
            !candidate
                .ancestors()
                .any(|ancestor| elements.iter().any(|other| other.id() == ancestor.id()))
        })
        .copied()
        .collect()
}

/// Keep only elements that contain no other element of the same list.
///
/// Document order is preserved.
#[must_use]
pub fn innermost<'a>(elements: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    elements
        .iter()
        .filter(|candidate| {
            !elements.iter().any(|other| {
                other.id() != candidate.id()
                    && other.ancestors().any(|ancestor| ancestor.id() == candidate.id())
            })
        })
        .copied()
        .collect()
}

/// Text of the element's own text children, without descendants.
#[must_use]
pub fn own_text(element: ElementRef<'_>) -> String {
    let raw: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect();
    clean_text(&raw)
}
