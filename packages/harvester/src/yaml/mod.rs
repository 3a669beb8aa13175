//! YAML output generation for chapter extractions.

mod writer;

pub use writer::{chapter_path, generate_yaml, save_yaml};
