//! Keyword topic extraction
//!
//! Term-frequency keywords with stopword removal. Pure and deterministic.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

/// Default number of topics extracted per insight
pub const DEFAULT_TOP_N: usize = 5;

/// Minimum token length (ASCII letters)
pub const MIN_TOKEN_LEN: usize = 3;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"[A-Za-z]{3,}").unwrap();
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
        "of", "with", "by", "from", "as", "is", "was", "are", "were", "been",
        "be", "have", "has", "had", "do", "does", "did", "will", "would",
        "could", "should", "may", "might", "must", "can", "this", "that",
        "these", "those", "it", "its", "they", "their", "them", "he", "she",
        "his", "her", "we", "our", "you", "your", "i", "my", "me", "not",
        "no", "yes", "so", "if", "then", "than", "when", "where", "what",
        "which", "who", "how", "why", "all", "each", "every", "both", "few",
        "more", "most", "other", "some", "such", "only", "own", "same", "just",
        "also", "very", "even", "still", "already", "about", "into", "through",
        "during", "before", "after", "above", "below", "between", "under",
        "again", "further", "once", "here", "there", "any", "up", "down", "out",
    ]
    .into_iter()
    .collect();
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Extract up to `top_n` lowercase keywords from `text`, most frequent first.
///
/// Tokens are maximal runs of at least three ASCII letters. Ties keep the
/// order in which the tokens first appear.
pub fn extract_topics(text: &str, top_n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for m in WORD_RE.find_iter(text) {
        let token = m.as_str().to_ascii_lowercase();
        if is_stopword(&token) {
            continue;
        }
        match slots.get(&token) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(token.clone(), counts.len());
                counts.push((token, 1));
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(top_n).map(|(token, _)| token).collect()
}
