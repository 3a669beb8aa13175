//! Locating verse-bearing nodes on a page.

use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};

use crate::config::{
    WorkConfig, MAX_NODE_CHARS, MIN_NODE_CHARS, MIN_WRAPPED_VERSE_CHARS, MIN_WRAPPER_SCAN_CHARS,
};
use crate::error::Result;
use crate::extraction::numbering::VerseNumberResolver;
use crate::html::{element_text, flatten_text, innermost, outermost, own_text, parse_selector};
use crate::text::{char_len, has_diacritics, word_count};

/// Block-level tags scanned when no selector hint matches.
const BLOCK_SCAN_SELECTOR: &str = "div, p, section, article, li, blockquote, td";

/// Tags scanned by the page-wide alternative pass.
const PAGE_SCAN_SELECTOR: &str = "div, p, span";

/// Minimum word count of a node recognized as verse-shaped.
const MIN_VERSE_WORDS: usize = 5;

/// How candidate nodes were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateMethod {
    /// A selector hint matched.
    Hint {
        selector: String,
        /// Candidates were unwrapped from a multi-verse container.
        unwrapped: bool,
    },
    /// No hint matched; block-level nodes with a source-script signature.
    BlockScan,
}

/// Candidate nodes in document order.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub nodes: Vec<ElementRef<'a>>,
    pub method: LocateMethod,
}

struct SelectorHint {
    source: String,
    selector: Selector,
    wrapper: bool,
}

/// Finds DOM nodes that each plausibly hold one verse.
pub struct ElementLocator<'w> {
    work: &'w WorkConfig,
    resolver: VerseNumberResolver,
    hints: Vec<SelectorHint>,
    block_selector: Selector,
    page_selector: Selector,
}

impl<'w> ElementLocator<'w> {
    /// Compile the work's selector hints.
    pub fn new(work: &'w WorkConfig, resolver: VerseNumberResolver) -> Result<Self> {
        let hints = work
            .selector_hints
            .iter()
            .map(|hint| {
                Ok(SelectorHint {
                    source: hint.clone(),
                    selector: parse_selector(hint)?,
                    wrapper: work.wrapper_selectors.contains(hint),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            work,
            resolver,
            hints,
            block_selector: parse_selector(BLOCK_SCAN_SELECTOR)?,
            page_selector: parse_selector(PAGE_SCAN_SELECTOR)?,
        })
    }

    /// Locate candidate nodes.
    ///
    /// The first hint producing candidates wins. Wrapper hints are unwrapped
    /// one level. Without any usable hint, block-level nodes carrying the
    /// source script and between 20 and 2000 characters are scanned. Plain
    /// hint matches and scanned blocks keep their outermost nodes, except
    /// that a node whose candidate descendants carry labels of two or more
    /// verses gives way to those descendants.
    #[must_use]
    pub fn locate<'a>(&self, doc: &'a Html) -> Located<'a> {
        for hint in &self.hints {
            let matches: Vec<ElementRef<'a>> = doc.select(&hint.selector).collect();
            if matches.is_empty() {
                continue;
            }

            let (nodes, unwrapped) = if hint.wrapper {
                let unwrapped = self.unwrap_containers(&outermost(&matches));
                if unwrapped.is_empty() {
                    (self.long_enough(outermost(&matches)), false)
                } else {
                    (unwrapped, true)
                }
            } else {
                (self.split_wrappers(&self.long_enough(matches)), false)
            };

            if nodes.is_empty() {
                tracing::debug!(selector = %hint.source, "hint matched only short nodes");
                continue;
            }

            tracing::debug!(
                selector = %hint.source,
                candidates = nodes.len(),
                unwrapped,
                "selector hint matched"
            );
            return Located {
                nodes,
                method: LocateMethod::Hint {
                    selector: hint.source.clone(),
                    unwrapped,
                },
            };
        }

        let blocks: Vec<ElementRef<'a>> = doc
            .select(&self.block_selector)
            .filter(|el| {
                let text = element_text(*el);
                let len = char_len(&text);
                (MIN_NODE_CHARS..=MAX_NODE_CHARS).contains(&len)
                    && self.work.source_script.is_present_in(&text)
            })
            .collect();
        let nodes = self.split_wrappers(&blocks);
        tracing::debug!(candidates = nodes.len(), "no selector hint matched, scanned blocks");

        Located {
            nodes,
            method: LocateMethod::BlockScan,
        }
    }

    /// Every verse-shaped node on the page, regardless of hints.
    ///
    /// Verse-shaped: 20 to 2000 characters, source script or transliteration
    /// diacritics present, more than five words, no navigation vocabulary.
    #[must_use]
    pub fn scan_page<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        let shaped: Vec<ElementRef<'a>> = doc
            .select(&self.page_selector)
            .filter(|el| self.looks_like_verse(&element_text(*el)))
            .collect();
        outermost(&shaped)
    }

    fn looks_like_verse(&self, text: &str) -> bool {
        let len = char_len(text);
        if !(MIN_NODE_CHARS..=MAX_NODE_CHARS).contains(&len) {
            return false;
        }
        let lower = text.to_lowercase();
        let navigation = self
            .work
            .labels
            .navigation_words
            .iter()
            .any(|w| lower.contains(&w.to_lowercase()));

        (self.work.source_script.is_present_in(text) || has_diacritics(text))
            && !navigation
            && word_count(text) > MIN_VERSE_WORDS
    }

    /// Outermost candidates, descending into nodes that wrap several
    /// labeled verses.
    fn split_wrappers<'a>(&self, candidates: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
        let mut nodes = Vec::new();
        self.collect_split(&outermost(candidates), candidates, &mut nodes);
        nodes
    }

    fn collect_split<'a>(
        &self,
        level: &[ElementRef<'a>],
        candidates: &[ElementRef<'a>],
        nodes: &mut Vec<ElementRef<'a>>,
    ) {
        for node in level {
            let inner: Vec<ElementRef<'a>> = candidates
                .iter()
                .filter(|c| c.ancestors().any(|a| a.id() == node.id()))
                .copied()
                .collect();
            let labeled: BTreeSet<u32> = inner
                .iter()
                .filter_map(|c| self.labeled_verse(*c))
                .collect();

            if labeled.len() >= 2 {
                tracing::debug!(verses = ?labeled, "splitting multi-verse node");
                self.collect_split(&outermost(&inner), candidates, nodes);
            } else {
                nodes.push(*node);
            }
        }
    }

    /// Verse number of the first verse label in the node's text.
    fn labeled_verse(&self, node: ElementRef<'_>) -> Option<u32> {
        let text = flatten_text(node);
        let start = self.resolver.next_label(&text, 0)?;
        self.resolver
            .resolve_text(&text[start..])
            .map(|numbers| numbers.first())
    }

    fn long_enough<'a>(&self, nodes: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
        nodes
            .into_iter()
            .filter(|el| char_len(&element_text(*el)) >= MIN_NODE_CHARS)
            .collect()
    }

    /// Find single-verse nodes inside multi-verse containers.
    ///
    /// Starting from every element whose own text begins with a verse label,
    /// climb to the nearest node (below the container) that carries both the
    /// source script and target-language letters and is longer than 50
    /// characters.
    fn unwrap_containers<'a>(&self, containers: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
        let mut found: Vec<ElementRef<'a>> = Vec::new();

        for container in containers {
            let labeled = container
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|el| self.resolver.starts_with_label(&own_text(*el)));

            for label in labeled {
                let verse_node = std::iter::once(label)
                    .chain(
                        label
                            .ancestors()
                            .filter_map(ElementRef::wrap)
                            .take_while(|el| el.id() != container.id()),
                    )
                    .find(|el| self.is_verse_block(&element_text(*el), MIN_WRAPPED_VERSE_CHARS));

                if let Some(node) = verse_node {
                    if !found.iter().any(|f| f.id() == node.id()) {
                        found.push(node);
                    }
                }
            }
        }

        if found.is_empty() {
            let scanned: Vec<ElementRef<'a>> = containers
                .iter()
                .flat_map(|container| {
                    container
                        .descendants()
                        .skip(1)
                        .filter_map(ElementRef::wrap)
                        .filter(|el| el.value().name() == "div")
                        .filter(|el| {
                            let text = element_text(*el);
                            self.resolver.contains_label(&text)
                                && self.work.source_script.is_present_in(&text)
                                && char_len(&text) > MIN_WRAPPER_SCAN_CHARS
                        })
                })
                .collect();
            found = innermost(&scanned);
            tracing::debug!(candidates = found.len(), "secondary wrapper scan");
        }

        found
    }

    fn is_verse_block(&self, text: &str, min_chars: usize) -> bool {
        char_len(text) > min_chars
            && self.work.source_script.is_present_in(text)
            && self.work.has_target_letters(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::bhagavad_gita;
    use pretty_assertions::assert_eq;

    fn locator(work: &WorkConfig) -> ElementLocator<'_> {
        let resolver = VerseNumberResolver::new(&work.labels).unwrap();
        ElementLocator::new(work, resolver).unwrap()
    }

    fn ids(nodes: &[ElementRef<'_>]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.value().attr("id").unwrap_or("?").to_string())
            .collect()
    }

    const WRAPPED: &str = r#"
        <div class="av-verses">
          <div class="r-verse" id="v1">
            <div class="r-label">ТЕКСТ 1</div>
            <div class="r-devanagari">धृतराष्ट्र उवाच धर्मक्षेत्रे कुरुक्षेत्रे</div>
            <div class="r-translation">Дхритараштра сказал: О Санджая, что сделали мои сыновья?</div>
          </div>
          <div class="r-verse" id="v2">
            <div class="r-label">ТЕКСТЫ 2-3</div>
            <div class="r-devanagari">सञ्जय उवाच दृष्ट्वा तु पाण्डवानीकं</div>
            <div class="r-translation">Санджая сказал: О царь, осмотрев войско сыновей Панду...</div>
          </div>
        </div>"#;

    #[test]
    fn test_unwraps_multi_verse_container() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(WRAPPED);
        let located = locator(&bg).locate(&doc);
        assert_eq!(ids(&located.nodes), vec!["v1", "v2"]);
        assert_eq!(
            located.method,
            LocateMethod::Hint {
                selector: ".av-verses".to_string(),
                unwrapped: true
            }
        );
    }

    #[test]
    fn test_plain_hint_keeps_outermost_long_matches() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<div class="verse" id="a">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे<div class="verse" id="inner">ТЕКСТ 1 धर्म</div></div>
               <div class="verse" id="short">коротко</div>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(ids(&located.nodes), vec!["a"]);
    }

    #[test]
    fn test_block_scan_fallback() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<main><p id="p1">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता</p><p id="nav">Глава 1</p><p id="p2">ТЕКСТ 2 सञ्जय उवाच दृष्ट्वा</p><p id="tiny">धर्म</p></main>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(located.method, LocateMethod::BlockScan);
        assert_eq!(ids(&located.nodes), vec!["p1", "p2"]);
    }

    #[test]
    fn test_block_scan_splits_multi_verse_section() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<section id="s"><p id="p1">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</p><p id="p2">ТЕКСТ 2 सञ्जय उवाच दृष्ट्वा तु पाण्डवानीकं</p></section>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(located.method, LocateMethod::BlockScan);
        assert_eq!(ids(&located.nodes), vec!["p1", "p2"]);
    }

    #[test]
    fn test_block_scan_splits_nested_wrappers() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<article id="a"><div id="d"><p id="p1">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</p><p id="p2">ТЕКСТ 2 सञ्जय उवाच दृष्ट्वा तु पाण्डवानीकं</p></div><p id="p3">ТЕКСТ 3 पश्यैतां पाण्डुपुत्राणामाचार्य महतीं चमूम्</p></article>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(ids(&located.nodes), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_block_scan_keeps_single_verse_block() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<div id="v"><p id="src">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</p><p id="more">मामकाः पाण्डवाश्चैव किमकुर्वत सञ्जय</p></div>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(ids(&located.nodes), vec!["v"]);
    }

    #[test]
    fn test_plain_hint_splits_multi_verse_match() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<div class="verses" id="all"><div class="verse-item" id="v1">ТЕКСТ 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</div><div class="verse-item" id="v2">ТЕКСТ 2 सञ्जय उवाच दृष्ट्वा तु पाण्डवानीकं</div></div>"#,
        );
        let located = locator(&bg).locate(&doc);
        assert_eq!(ids(&located.nodes), vec!["v1", "v2"]);
        assert_eq!(
            located.method,
            LocateMethod::Hint {
                selector: "[class*=\"verse\"]".to_string(),
                unwrapped: false
            }
        );
    }

    #[test]
    fn test_never_returns_short_nodes() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(r#"<div class="verse">ТЕКСТ 1</div>"#);
        let located = locator(&bg).locate(&doc);
        assert!(located
            .nodes
            .iter()
            .all(|n| char_len(&element_text(*n)) >= MIN_NODE_CHARS));
    }

    #[test]
    fn test_scan_page_filters_navigation() {
        let bg = bhagavad_gita();
        let doc = Html::parse_document(
            r#"<span id="s1">धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः मामकाः पाण्डवाश्चैव</span>
               <span id="nav">Глава 1 धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</span>"#,
        );
        let nodes = locator(&bg).scan_page(&doc);
        assert_eq!(ids(&nodes), vec!["s1"]);
    }

    #[test]
    fn test_invalid_hint_is_rejected() {
        let mut bg = bhagavad_gita();
        bg.selector_hints = vec!["[[".to_string()];
        let resolver = VerseNumberResolver::new(&bg.labels).unwrap();
        assert!(ElementLocator::new(&bg, resolver).is_err());
    }
}
