//! End-to-end integration tests for the harvester pipeline.
//!
//! Tests the complete pipeline from raw chapter pages to YAML output using
//! saved pages of the Bhagavad-gita and Srimad-Bhagavatam.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use verse_harvester::config::{bhagavad_gita, srimad_bhagavatam};
use verse_harvester::extraction::page_has_verses;
use verse_harvester::harvester::{extract_chapter, harvest_work, HarvestOptions};
use verse_harvester::source::DirPageSource;
use verse_harvester::types::{ChapterExtraction, ChapterLocator, ExtractionMethod, QualityGrade};
use verse_harvester::yaml::{generate_yaml, save_yaml};

/// Load fixture file content.
fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

/// Run the pipeline on the first chapter of the Bhagavad-gita.
fn run_pipeline() -> ChapterExtraction {
    let bg = bhagavad_gita();
    let html = load_fixture("bg_1_advanced_view.html");
    let locator = ChapterLocator::new("bg", 1);
    let url = bg.chapter_url(None, 1);
    extract_chapter(&bg, &html, &locator, &url).expect("extraction should succeed")
}

#[test]
fn test_pipeline_verse_numbers() {
    let extraction = run_pipeline();

    assert!(extraction.page_found);
    let verses: Vec<u32> = extraction.records.iter().map(|r| r.id.verse).collect();
    assert_eq!(verses, vec![14, 15, 16, 17, 18, 19]);
    assert_eq!(extraction.skipped_nodes, 0);
}

#[test]
fn test_pipeline_merged_block() {
    let extraction = run_pipeline();
    let merged: Vec<_> = extraction.records.iter().filter(|r| r.is_merged()).collect();

    assert_eq!(merged.len(), 3);
    let groups: HashSet<&str> = merged
        .iter()
        .filter_map(|r| r.merge.as_ref().map(|m| m.group_id.as_str()))
        .collect();
    assert_eq!(groups.len(), 1, "merged records should share one group id");
    assert!(merged.iter().all(|r| r.merged_with() == vec![16, 17, 18]));
    assert!(merged
        .iter()
        .all(|r| r.content.translation == merged[0].content.translation));
    assert!(merged
        .iter()
        .all(|r| r.provenance.method == ExtractionMethod::MergedBlock));
    assert!(merged[0]
        .content
        .translation
        .as_deref()
        .unwrap()
        .starts_with("Царь Юдхиштхира"));
}

#[test]
fn test_pipeline_fields() {
    let extraction = run_pipeline();
    let verse = &extraction.records[0];

    assert_eq!(verse.id.verse, 14);
    assert_eq!(verse.id.language, "ru");
    assert!(verse.content.source_text.as_deref().unwrap().contains("श्वेतैर्हयैर्युक्ते"));
    assert!(verse
        .content
        .transliteration
        .as_deref()
        .unwrap()
        .starts_with("татах̣ ш́ветаир"));
    assert!(verse.content.gloss.as_deref().unwrap().contains("белыми"));
    assert!(verse
        .content
        .commentary
        .as_deref()
        .unwrap()
        .contains("божественными"));
    assert_eq!(verse.quality.score, 5);
    assert_eq!(
        verse.provenance.url,
        "https://vedabase.io/ru/library/bg/1/advanced-view/#14"
    );
}

#[test]
fn test_pipeline_degraded_record() {
    let extraction = run_pipeline();
    let last = extraction.records.last().unwrap();

    assert_eq!(last.id.verse, 19);
    assert_eq!(last.quality.grade, QualityGrade::Degraded);
    assert!(last.content.translation.is_none());
    assert_eq!(extraction.accepted_count(), 5);
    assert_eq!(extraction.degraded_count(), 1);
    assert!(extraction
        .warnings
        .contains(&"1 verses below quality threshold".to_string()));
}

#[test]
fn test_pipeline_section_labels() {
    let sb = srimad_bhagavatam();
    let html = load_fixture("sb_1_1_labels.html");
    let locator = ChapterLocator::new("sb", 1).with_division(Some(1));
    let extraction = extract_chapter(&sb, &html, &locator, "url").unwrap();

    assert_eq!(extraction.records.len(), 2);
    let first = &extraction.records[0];
    assert!(first.passes_quality_gate());
    assert!(first
        .content
        .translation
        .as_deref()
        .unwrap()
        .starts_with("О мой Господь"));
    assert!(first.content.gloss.as_deref().unwrap().contains("творение"));
    assert!(first
        .content
        .source_text
        .as_deref()
        .unwrap()
        .starts_with("जन्माद्यस्य"));
}

#[test]
fn test_probe_rejects_not_found_page() {
    let bg = bhagavad_gita();
    assert!(!page_has_verses(&load_fixture("not_found.html"), &bg));
    assert!(page_has_verses(&load_fixture("bg_1_advanced_view.html"), &bg));

    let extraction = extract_chapter(
        &bg,
        &load_fixture("not_found.html"),
        &ChapterLocator::new("bg", 1),
        "url",
    )
    .unwrap();
    assert!(!extraction.page_found);
    assert!(extraction.is_empty());
}

#[test]
fn test_pipeline_yaml_output() {
    let extraction = run_pipeline();
    let yaml = generate_yaml(&extraction).unwrap();

    assert!(yaml.starts_with("---\n"));
    assert!(yaml.contains("work: bg"));
    assert!(yaml.contains("method: merged_block"));
    assert!(yaml.contains("grade: degraded"));

    let temp_dir = tempfile::tempdir().unwrap();
    let path = save_yaml(&extraction, temp_dir.path()).unwrap();
    assert_eq!(path, temp_dir.path().join("bg").join("1.yaml"));
    assert_eq!(fs::read_to_string(path).unwrap(), yaml);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_harvest_division_from_directory() {
    let sb = srimad_bhagavatam();
    let mirror = tempfile::tempdir().unwrap();
    let page_dir = mirror.path().join("1").join("1").join("advanced-view");
    fs::create_dir_all(&page_dir).unwrap();
    fs::write(page_dir.join("index.html"), load_fixture("sb_1_1_labels.html")).unwrap();

    let source = DirPageSource::new(mirror.path(), sb.base_url.clone());
    let options = HarvestOptions::default().with_division(Some(1));
    let result = harvest_work(
        Arc::new(source),
        Arc::new(sb),
        options,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Chapter 1 found, chapters 2-4 missing end the division
    assert_eq!(result.chapters.len(), 1);
    assert_eq!(result.chapters[0].locator.division, Some(1));
    assert_eq!(result.total_records(), 2);
    assert!(result.errors.is_empty());
    assert!(result.is_success());
}
