//! Verse extraction and quality validation.
//!
//! A page goes through [`VerseAssembler`], which combines:
//!
//! - [`ElementLocator`]: candidate nodes from selector hints or a block scan
//! - [`VerseNumberResolver`]: single numbers and merged ranges from labels
//! - [`FieldExtractor`]: ordered strategies per field with shape checks
//! - [`QualityScorer`]: composite 0..=5 score and the acceptance gate
//! - [`MergedBlockSplitter`]: one record per verse of a merged block
//!
//! [`page_has_verses`] is the cheap existence probe run before assembly.

mod assembler;
mod fields;
mod locator;
mod merge;
mod numbering;
mod probe;
mod quality;

pub(crate) use assembler::BestRecords;
pub use assembler::VerseAssembler;
pub use fields::{
    is_shape_valid, FieldExtractor, FieldStrategy, LabelSplitStrategy, MarkerNodeStrategy,
    PatternSearchStrategy, Scope,
};
pub use locator::{ElementLocator, LocateMethod, Located};
pub use merge::MergedBlockSplitter;
pub use numbering::{VerseNumberResolver, VerseNumbers};
pub use probe::{page_has_verses, probe, ProbeMiss};
pub use quality::QualityScorer;
