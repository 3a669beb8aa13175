//! Verse Harvester - Extract and validate scripture verses from HTML pages.
//!
//! This crate locates verse-bearing nodes on chapter pages of vedabase-style
//! sites, splits them into fields (source text, transliteration, gloss,
//! translation, commentary), scores each verse and emits one record per
//! verse, including verses published as merged blocks such as "TEXTS 16-18".
//!
//! # Example
//!
//! ```
//! use verse_harvester::config::find_work;
//! use verse_harvester::harvester::extract_chapter;
//! use verse_harvester::types::ChapterLocator;
//!
//! let bg = find_work("bg").unwrap();
//! let html = r#"<div class="verse">ТЕКСТ 1
//!   <div class="av-devanagari">धर्मक्षेत्रे कुरुक्षेत्रे समवेता युयुत्सवः</div>
//!   <div class="av-translation">Дхритараштра сказал: О Санджая, что сделали мои сыновья?</div>
//! </div>"#;
//!
//! let extraction = extract_chapter(&bg, html, &ChapterLocator::new("bg", 1), "url").unwrap();
//! assert_eq!(extraction.records.len(), 1);
//! assert!(extraction.records[0].passes_quality_gate());
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Constants, validation and work configurations
//! - [`types`]: Verse records, chapter extractions and run results
//! - [`error`]: Error types and Result alias
//! - [`text`]: Text normalization and script checks
//! - [`html`]: DOM helpers over `scraper`
//! - [`extraction`]: Locating, numbering, field extraction, scoring, merging
//! - [`http`]: HTTP client with retries
//! - [`source`]: Page sources (HTTP or a mirrored directory)
//! - [`harvester`]: Chapter, division and whole-work orchestration
//! - [`yaml`]: YAML output generation
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod harvester;
pub mod html;
pub mod http;
pub mod source;
pub mod text;
pub mod types;
pub mod yaml;

// Re-export main functions
pub use harvester::{extract_chapter, harvest_work, ChapterHarvester, HarvestOptions};

// Re-export commonly used items
pub use config::{find_work, WorkConfig};
pub use error::{HarvesterError, Result};
pub use extraction::{page_has_verses, VerseAssembler};
pub use source::{DirPageSource, HttpPageSource, PageSource};
pub use types::{ChapterExtraction, ChapterLocator, RunResult, VerseRecord};
