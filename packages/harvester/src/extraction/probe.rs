//! Cheap existence check over raw page markup.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::WorkConfig;

/// A title tag mentioning 404.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TITLE_404_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>[^<]*\b404\b[^<]*</title>").expect("valid regex")
});

/// An explicit "page not found" heading.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NOT_FOUND_HEADING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h1[^>]*>[^<]*(?:page not found|страница не найдена)[^<]*</h1>")
        .expect("valid regex")
});

/// An error container element.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ERROR_CONTAINER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*\bclass\s*=\s*["'][^"']*error[^"']*["'][^>]*>"#)
        .expect("valid regex")
});

/// Why a page was judged missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMiss {
    /// Neither the source script nor any verse indicator is present.
    NoSignature,
    /// The page matches a "not found" pattern.
    NotFound(&'static str),
}

/// Check raw markup for a real verse page.
///
/// Returns `Ok(())` when the markup contains a source-script signature or a
/// verse indicator and no "not found" marker.
pub fn probe(html: &str, work: &WorkConfig) -> std::result::Result<(), ProbeMiss> {
    let patterns: [(&'static str, &Regex); 3] = [
        ("404 title", &*TITLE_404_PATTERN),
        ("not found heading", &*NOT_FOUND_HEADING_PATTERN),
        ("error container", &*ERROR_CONTAINER_PATTERN),
    ];
    if let Some(&(name, _)) = patterns.iter().find(|(_, pattern)| pattern.is_match(html)) {
        return Err(ProbeMiss::NotFound(name));
    }

    if work.source_script.is_present_in(html) {
        return Ok(());
    }
    let lower = html.to_lowercase();
    if work
        .labels
        .probe_indicators
        .iter()
        .any(|indicator| lower.contains(&indicator.to_lowercase()))
    {
        return Ok(());
    }
    Err(ProbeMiss::NoSignature)
}

/// Boolean form of [`probe`].
///
/// # Examples
/// ```
/// use verse_harvester::config::bhagavad_gita;
/// use verse_harvester::extraction::page_has_verses;
///
/// let bg = bhagavad_gita();
/// assert!(page_has_verses("<div>धर्मक्षेत्रे</div>", &bg));
/// assert!(!page_has_verses("<html><title>404</title></html>", &bg));
/// ```
#[must_use]
pub fn page_has_verses(html: &str, work: &WorkConfig) -> bool {
    match probe(html, work) {
        Ok(()) => true,
        Err(miss) => {
            tracing::debug!(work = %work.id, reason = ?miss, "page probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{bhagavad_gita, chaitanya_charitamrita};

    #[test]
    fn test_script_signature() {
        let bg = bhagavad_gita();
        assert!(page_has_verses("<p>धर्मक्षेत्रे कुरुक्षेत्रे</p>", &bg));
    }

    #[test]
    fn test_indicator_keyword() {
        let bg = bhagavad_gita();
        assert!(page_has_verses("<div class=\"av-verses\"></div>", &bg));
        assert!(page_has_verses("<p>текст 1</p>", &bg));
    }

    #[test]
    fn test_no_signature() {
        let bg = bhagavad_gita();
        assert_eq!(
            probe("<html><body><p>Привет</p></body></html>", &bg),
            Err(ProbeMiss::NoSignature)
        );
    }

    #[test]
    fn test_not_found_patterns() {
        let bg = bhagavad_gita();
        assert_eq!(
            probe("<title>Error 404</title><p>ТЕКСТ</p>", &bg),
            Err(ProbeMiss::NotFound("404 title"))
        );
        assert_eq!(
            probe("<h1>Страница не найдена</h1>धर्म", &bg),
            Err(ProbeMiss::NotFound("not found heading"))
        );
        assert_eq!(
            probe("<div class=\"page-error\">oops</div>धर्म", &bg),
            Err(ProbeMiss::NotFound("error container"))
        );
    }

    #[test]
    fn test_404_inside_verse_text_is_not_a_miss() {
        let bg = bhagavad_gita();
        assert!(page_has_verses(
            "<title>Бхагавад-гита 4.04</title><p>धर्म 404</p>",
            &bg
        ));
    }

    #[test]
    fn test_bengali_work_uses_its_script() {
        let cc = chaitanya_charitamrita();
        assert!(probe("<p>বন্দে গুরূনীশভক্তানীশমীশাবতারকান্</p>", &cc).is_ok());
    }
}
