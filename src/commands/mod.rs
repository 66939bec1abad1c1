pub mod connections;
pub mod ingest;
pub mod insight;
pub mod search;
pub mod stats;
pub mod topics;

use colored::{ColoredString, Colorize};

/// Char-aware truncation for terminal output
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

pub(crate) fn colored_score(score: f32) -> ColoredString {
    let score_str = format!("{:.2}", score);
    if score > 0.8 {
        score_str.green()
    } else if score > 0.5 {
        score_str.yellow()
    } else {
        score_str.dimmed()
    }
}
