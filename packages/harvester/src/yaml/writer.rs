//! YAML writer for chapter extractions.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::types::{
    ChapterExtraction, ChapterLocator, ChapterStats, ExtractionMethod, QualityGrade, VerseRecord,
};

/// Record counts of a chapter.
#[derive(Debug, Serialize)]
struct YamlCounts {
    total: usize,
    accepted: usize,
    degraded: usize,
    skipped_nodes: usize,
}

#[derive(Debug, Serialize)]
struct YamlProvenance {
    url: String,
    method: ExtractionMethod,
    raw_text_length: usize,
}

#[derive(Debug, Serialize)]
struct YamlMerge {
    group_id: String,
    verses: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct YamlQuality {
    score: u8,
    grade: QualityGrade,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<String>,
}

/// Verse representation for YAML serialization.
#[derive(Debug, Serialize)]
struct YamlVerse {
    verse: u32,
    language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transliteration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gloss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commentary: Option<String>,
    provenance: YamlProvenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge: Option<YamlMerge>,
    quality: YamlQuality,
}

impl From<&VerseRecord> for YamlVerse {
    fn from(r: &VerseRecord) -> Self {
        Self {
            verse: r.id.verse,
            language: r.id.language.clone(),
            source_text: r.content.source_text.clone(),
            transliteration: r.content.transliteration.clone(),
            gloss: r.content.gloss.clone(),
            translation: r.content.translation.clone(),
            commentary: r.content.commentary.clone(),
            provenance: YamlProvenance {
                url: r.provenance.url.clone(),
                method: r.provenance.method,
                raw_text_length: r.provenance.raw_text_length,
            },
            merge: r.merge.as_ref().map(|m| YamlMerge {
                group_id: m.group_id.clone(),
                verses: m.verses.clone(),
            }),
            quality: YamlQuality {
                score: r.quality.score,
                grade: r.quality.grade,
                issues: r.quality.issues.iter().map(ToString::to_string).collect(),
            },
        }
    }
}

/// Full chapter representation for YAML serialization.
#[derive(Debug, Serialize)]
struct YamlChapter {
    work: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    division: Option<u32>,
    chapter: u32,
    url: String,
    page_found: bool,
    counts: YamlCounts,
    stats: ChapterStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    verses: Vec<YamlVerse>,
}

fn generate_yaml_struct(extraction: &ChapterExtraction) -> YamlChapter {
    let locator = &extraction.locator;
    YamlChapter {
        work: locator.work.clone(),
        division: locator.division,
        chapter: locator.chapter,
        url: extraction.url.clone(),
        page_found: extraction.page_found,
        counts: YamlCounts {
            total: extraction.records.len(),
            accepted: extraction.accepted_count(),
            degraded: extraction.degraded_count(),
            skipped_nodes: extraction.skipped_nodes,
        },
        stats: extraction.stats(),
        warnings: extraction.warnings.clone(),
        verses: extraction.records.iter().map(YamlVerse::from).collect(),
    }
}

/// Generate YAML string from a chapter extraction.
pub fn generate_yaml(extraction: &ChapterExtraction) -> Result<String> {
    let yaml_string = serde_yaml_ng::to_string(&generate_yaml_struct(extraction))?;

    // Add document start marker and clean up trailing whitespace
    let lines: Vec<&str> = yaml_string.lines().map(str::trim_end).collect();
    Ok(format!("---\n{}\n", lines.join("\n")))
}

/// Output path of a chapter below `output_base`.
///
/// `{output_base}/{work}/{chapter}.yaml` for flat works,
/// `{output_base}/{work}/{division}/{chapter}.yaml` otherwise.
#[must_use]
pub fn chapter_path(locator: &ChapterLocator, output_base: &Path) -> PathBuf {
    let mut dir = output_base.join(&locator.work);
    if let Some(division) = locator.division {
        dir.push(division.to_string());
    }
    dir.join(format!("{}.yaml", locator.chapter))
}

/// Save a chapter extraction as a YAML file.
///
/// Uses atomic write pattern: writes to temp file, syncs to disk, then renames.
///
/// # Returns
/// Path to the saved file
pub fn save_yaml(extraction: &ChapterExtraction, output_base: &Path) -> Result<PathBuf> {
    let output_file = chapter_path(&extraction.locator, output_base);
    let output_dir = output_file
        .parent()
        .map_or_else(|| output_base.to_path_buf(), Path::to_path_buf);
    fs::create_dir_all(&output_dir)?;

    let temp_file = output_dir.join(format!(".{}.yaml.tmp", extraction.locator.chapter));
    let content = generate_yaml(extraction)?;

    {
        let mut file = File::create(&temp_file)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    // On Windows, rename fails if the destination already exists
    #[cfg(target_os = "windows")]
    if output_file.exists() {
        fs::remove_file(&output_file)?;
    }

    fs::rename(&temp_file, &output_file)?;
    tracing::debug!(path = %output_file.display(), "chapter saved");

    Ok(output_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Field, MergeInfo, Provenance, QualityIssue, QualityReport, VerseContent, VerseId,
    };
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(verse: u32, merge: Option<MergeInfo>) -> VerseRecord {
        VerseRecord {
            id: VerseId {
                work: "sb".to_string(),
                division: Some(1),
                chapter: 2,
                verse,
                language: "ru".to_string(),
            },
            content: VerseContent {
                source_text: Some("धर्मः प्रोज्झितकैतवोऽत्र".to_string()),
                translation: Some("Отвергая все материально мотивированные действия.".to_string()),
                ..VerseContent::default()
            },
            provenance: Provenance {
                url: format!("https://example.org/sb/1/2/advanced-view/#{verse}"),
                method: ExtractionMethod::Structured,
                raw_text_length: 120,
            },
            merge,
            quality: QualityReport {
                score: 4,
                grade: QualityGrade::Accepted,
                issues: vec![QualityIssue::Missing(Field::Gloss)],
            },
        }
    }

    fn extraction() -> ChapterExtraction {
        let merge = MergeInfo {
            group_id: "sb_1_2_3_4_abcdef12".to_string(),
            verses: vec![3, 4],
        };
        ChapterExtraction {
            locator: ChapterLocator::new("sb", 2).with_division(Some(1)),
            url: "https://example.org/sb/1/2/advanced-view/".to_string(),
            page_found: true,
            records: vec![
                record(1, None),
                record(3, Some(merge.clone())),
                record(4, Some(merge)),
            ],
            skipped_nodes: 1,
            warnings: vec!["expected 5 verses, extracted 3".to_string()],
        }
    }

    #[test]
    fn test_generate_yaml() {
        let yaml = generate_yaml(&extraction()).unwrap();

        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("work: sb"));
        assert!(yaml.contains("division: 1"));
        assert!(yaml.contains("chapter: 2"));
        assert!(yaml.contains("method: structured"));
        assert!(yaml.contains("grade: accepted"));
        assert!(yaml.contains("group_id: sb_1_2_3_4_abcdef12"));
        assert!(yaml.contains("skipped_nodes: 1"));
        assert!(!yaml.contains("commentary:"));
    }

    #[test]
    fn test_generate_yaml_is_parseable() {
        let yaml = generate_yaml(&extraction()).unwrap();
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&yaml).unwrap();

        assert_eq!(value["counts"]["total"].as_u64(), Some(3));
        assert_eq!(value["stats"]["merged"].as_u64(), Some(2));
        assert_eq!(value["verses"][1]["merge"]["verses"][1].as_u64(), Some(4));
        assert_eq!(
            value["verses"][0]["quality"]["issues"][0].as_str(),
            Some("gloss missing")
        );
    }

    #[test]
    fn test_chapter_path() {
        let base = Path::new("out");
        assert_eq!(
            chapter_path(&ChapterLocator::new("bg", 3), base),
            PathBuf::from("out/bg/3.yaml")
        );
        assert_eq!(
            chapter_path(&ChapterLocator::new("sb", 2).with_division(Some(1)), base),
            PathBuf::from("out/sb/1/2.yaml")
        );
    }

    #[test]
    fn test_save_yaml() {
        let temp_dir = tempdir().unwrap();
        let output_path = save_yaml(&extraction(), temp_dir.path()).unwrap();

        assert_eq!(output_path, temp_dir.path().join("sb").join("1").join("2.yaml"));
        let content = fs::read_to_string(output_path).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(!temp_dir.path().join("sb/1/.2.yaml.tmp").exists());
    }
}
