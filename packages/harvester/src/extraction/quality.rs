//! Composite quality scoring of extracted verse content.

use crate::config::{WorkConfig, MAX_QUALITY_SCORE, QUALITY_THRESHOLD};
use crate::extraction::fields::is_shape_valid;
use crate::text::char_len;
use crate::types::{Field, QualityGrade, QualityIssue, QualityReport, VerseContent};

/// Transliterations longer than this earn their point.
const FULL_TRANSLITERATION_CHARS: usize = 20;

/// Scores verse content against the work's shape rules.
///
/// Scoring is a pure function of the content, so re-scoring a record always
/// yields the same report.
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer<'w> {
    work: &'w WorkConfig,
    threshold: u8,
}

impl<'w> QualityScorer<'w> {
    /// Create a scorer with the default acceptance threshold.
    #[must_use]
    pub fn new(work: &'w WorkConfig) -> Self {
        Self {
            work,
            threshold: QUALITY_THRESHOLD,
        }
    }

    /// Override the acceptance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Score content.
    ///
    /// +2 source text, +2 translation, +1 transliteration longer than 20
    /// characters, +1 gloss; clamped to 5.
    #[must_use]
    pub fn score(&self, content: &VerseContent) -> QualityReport {
        let mut score: u8 = 0;
        let mut issues = Vec::new();

        for (field, points) in [(Field::SourceText, 2), (Field::Translation, 2), (Field::Gloss, 1)] {
            match content.get(field) {
                Some(value) if is_shape_valid(field, value, self.work) => score += points,
                Some(_) => issues.push(QualityIssue::Invalid(field)),
                None => issues.push(QualityIssue::Missing(field)),
            }
        }

        match content.transliteration.as_deref() {
            Some(value) if is_shape_valid(Field::Transliteration, value, self.work) => {
                let chars = char_len(value.trim());
                if chars > FULL_TRANSLITERATION_CHARS {
                    score += 1;
                } else {
                    issues.push(QualityIssue::ShortTransliteration { chars });
                }
            }
            Some(_) => issues.push(QualityIssue::Invalid(Field::Transliteration)),
            None => issues.push(QualityIssue::Missing(Field::Transliteration)),
        }

        let score = score.min(MAX_QUALITY_SCORE);
        let grade = if score >= self.threshold {
            QualityGrade::Accepted
        } else {
            QualityGrade::Degraded
        };

        QualityReport {
            score,
            grade,
            issues,
        }
    }
}
