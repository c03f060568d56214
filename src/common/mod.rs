//! Common utilities: errors, configuration, logging, paths

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Cut `text` to at most `max` bytes on a char boundary, marking the cut.
pub fn truncate_output(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [{} bytes truncated]", &text[..end], text.len() - end)
}
