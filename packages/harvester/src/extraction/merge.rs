//! Splitting merged verse blocks into per-verse records.

use uuid::Uuid;

use crate::config::WorkConfig;
use crate::extraction::quality::QualityScorer;
use crate::types::{
    ChapterLocator, ExtractionMethod, MergeInfo, Provenance, VerseContent, VerseId, VerseRecord,
};

/// Builds records for one chapter, replicating shared content across the
/// verses of merged blocks.
#[derive(Debug, Clone, Copy)]
pub struct MergedBlockSplitter<'w> {
    work: &'w WorkConfig,
    scorer: QualityScorer<'w>,
}

impl<'w> MergedBlockSplitter<'w> {
    /// Create a splitter.
    #[must_use]
    pub fn new(work: &'w WorkConfig, scorer: QualityScorer<'w>) -> Self {
        Self { work, scorer }
    }

    /// Generate a merge-group identifier.
    ///
    /// Format: `{work}_{division or 0}_{chapter}_{min}_{max}_{random8}`.
    #[must_use]
    pub fn group_id(&self, locator: &ChapterLocator, verses: &[u32]) -> String {
        let min = verses.iter().min().copied().unwrap_or_default();
        let max = verses.iter().max().copied().unwrap_or_default();
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}_{min}_{max}_{}",
            self.work.id,
            locator.division.unwrap_or(0),
            locator.chapter,
            &random[..8]
        )
    }

    /// Build one scored record.
    #[must_use]
    pub fn record(
        &self,
        locator: &ChapterLocator,
        verse: u32,
        content: VerseContent,
        method: ExtractionMethod,
        raw_text_length: usize,
        merge: Option<MergeInfo>,
    ) -> VerseRecord {
        let quality = self.scorer.score(&content);
        VerseRecord {
            id: VerseId {
                work: self.work.id.clone(),
                division: locator.division,
                chapter: locator.chapter,
                verse,
                language: self.work.language.clone(),
            },
            content,
            provenance: Provenance {
                url: self
                    .work
                    .record_url(locator.division, locator.chapter, verse),
                method,
                raw_text_length,
            },
            merge,
            quality,
        }
    }

    /// Replicate content extracted once from a merged block into one record
    /// per verse number.
    ///
    /// All records share the content, the verse list and a fresh group id.
    /// Each record is scored on its own; degraded records are still returned.
    #[must_use]
    pub fn split(
        &self,
        locator: &ChapterLocator,
        verses: &[u32],
        content: &VerseContent,
        raw_text_length: usize,
    ) -> Vec<VerseRecord> {
        let info = MergeInfo {
            group_id: self.group_id(locator, verses),
            verses: verses.to_vec(),
        };

        tracing::debug!(
            group_id = %info.group_id,
            verses = ?verses,
            "splitting merged block"
        );

        verses
            .iter()
            .map(|verse| {
                self.record(
                    locator,
                    *verse,
                    content.clone(),
                    ExtractionMethod::MergedBlock,
                    raw_text_length,
                    Some(info.clone()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::srimad_bhagavatam;
    use pretty_assertions::assert_eq;

    fn content() -> VerseContent {
        VerseContent {
            source_text: Some("धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः".to_string()),
            translation: Some("Дхритараштра сказал: О Санджая, что сделали мои сыновья?".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_replicates_content() {
        let sb = srimad_bhagavatam();
        let splitter = MergedBlockSplitter::new(&sb, QualityScorer::new(&sb));
        let locator = ChapterLocator::new("sb", 3).with_division(Some(1));

        let records = splitter.split(&locator, &[16, 17, 18], &content(), 500);

        assert_eq!(records.len(), 3);
        let verses: Vec<u32> = records.iter().map(|r| r.id.verse).collect();
        assert_eq!(verses, vec![16, 17, 18]);

        let group = records[0].merge.as_ref().unwrap().group_id.clone();
        assert!(group.starts_with("sb_1_3_16_18_"));
        assert_eq!(group.len(), "sb_1_3_16_18_".len() + 8);
        for record in &records {
            let merge = record.merge.as_ref().unwrap();
            assert_eq!(merge.group_id, group);
            assert_eq!(merge.verses, vec![16, 17, 18]);
            assert_eq!(record.content, records[0].content);
            assert_eq!(record.provenance.method, ExtractionMethod::MergedBlock);
            assert!(record.passes_quality_gate());
        }
        assert_eq!(
            records[1].provenance.url,
            "https://vedabase.io/ru/library/sb/1/3/advanced-view/#17"
        );
    }

    #[test]
    fn test_group_ids_are_distinct() {
        let sb = srimad_bhagavatam();
        let splitter = MergedBlockSplitter::new(&sb, QualityScorer::new(&sb));
        let locator = ChapterLocator::new("sb", 3).with_division(Some(1));
        assert_ne!(
            splitter.group_id(&locator, &[1, 2]),
            splitter.group_id(&locator, &[1, 2])
        );
    }

    #[test]
    fn test_degraded_members_are_kept() {
        let sb = srimad_bhagavatam();
        let splitter = MergedBlockSplitter::new(&sb, QualityScorer::new(&sb));
        let locator = ChapterLocator::new("sb", 3).with_division(Some(1));
        let only_source = VerseContent {
            source_text: content().source_text,
            ..Default::default()
        };

        let records = splitter.split(&locator, &[4, 5], &only_source, 120);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.passes_quality_gate()));
    }
}
