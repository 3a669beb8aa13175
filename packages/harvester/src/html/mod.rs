//! DOM helpers over `scraper` for navigating rendered pages.

mod utils;

pub use utils::{
    ancestor_elements, element_text, flatten_text, has_class_containing, innermost, is_block_tag,
    non_empty_lines, outermost, own_text, parse_selector, sibling_elements, BLOCK_TAGS,
};
