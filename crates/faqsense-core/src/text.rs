//! Text normalization and keyword extraction.
//!
//! Matching uses exactly three normalizations: case folding, whitespace
//! trimming, and stopword removal. There is no stemming or lemmatization,
//! so `refund` and `refunds` are different keywords.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

/// English stopwords dropped during keyword extraction.
///
/// Contraction forms (`"don't"`) never survive tokenization since the
/// apostrophe splits them, but their fragments (`"don"`, `"t"`) are listed.
pub const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
    "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
    "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't",
    "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn",
    "mustn't", "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't",
    "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Returns true if `word` (already lowercase) is a stopword.
pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

/// Canonical form used for exact matching: trimmed and lowercased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Split lowercase text into word tokens.
///
/// A word is a maximal run of alphanumeric characters or underscores;
/// everything else (spaces, punctuation, apostrophes) separates words.
pub fn words(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

/// Extract the set of content keywords from `text`.
pub fn keywords(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    words(&lowered)
        .filter(|w| !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// Number of keywords present in both sets.
pub fn keyword_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}
