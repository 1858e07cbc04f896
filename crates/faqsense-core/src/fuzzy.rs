//! Approximate lexical matching.
//!
//! The scorer is a token-set ratio: both strings are split on whitespace
//! into deduplicated token sets, and the result is the best Indel-based
//! similarity among
//!
//! ```text
//! sorted(diff_ab)            vs  sorted(diff_ba)
//! sorted(intersection)       vs  sorted(intersection) + sorted(diff_ab)
//! sorted(intersection)       vs  sorted(intersection) + sorted(diff_ba)
//! ```
//!
//! Tokens are compared verbatim (no case folding, punctuation kept), so
//! `"refunds?"` and `"refunds"` are different tokens. A string whose tokens
//! are a subset of the other's scores `100`.
//!
//! Acceptance adds a keyword guard: a moderate score must be corroborated
//! by at least one shared content word, while a near-certain score is
//! accepted on its own.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::QaEntry;
use crate::text::{keyword_overlap, keywords};

/// Scores strictly above this bypass the keyword guard.
pub const DEFAULT_HIGH_CONFIDENCE: f64 = 95.0;

/// Acceptance parameters for the fuzzy stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyParams {
    /// Minimum token-set ratio, in `[0, 100]`.
    pub threshold: f64,
    /// Scores strictly above this are accepted without keyword overlap.
    pub high_confidence: f64,
    /// Shared keywords required below `high_confidence`.
    pub min_overlap: usize,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            high_confidence: DEFAULT_HIGH_CONFIDENCE,
            min_overlap: 1,
        }
    }
}

/// Outcome of the fuzzy stage for the single best-scoring entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyEvaluation {
    pub index: usize,
    pub question: String,
    pub score: f64,
    pub keyword_overlap: usize,
    pub accepted: bool,
}

/// Indel distance (insertions and deletions only) between two strings,
/// counted in `char`s.
pub fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn normalized_similarity(distance: usize, total_len: usize) -> f64 {
    if total_len == 0 {
        return 100.0;
    }
    100.0 * (1.0 - distance as f64 / total_len as f64)
}

/// Indel similarity ratio in `[0, 100]`. Two empty strings score `100`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    normalized_similarity(indel_distance(a, b), total)
}

/// Token-set ratio in `[0, 100]`, tolerant to word order and to one side
/// containing extra words.
///
/// Returns `0` when either string has no tokens.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let ab = diff_ab.join(" ");
    let ba = diff_ba.join(" ");

    let sect_len = sect.chars().count();
    let ab_len = ab.chars().count();
    let ba_len = ba.chars().count();
    let sep = usize::from(sect_len > 0);
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;

    let mut best = normalized_similarity(indel_distance(&ab, &ba), sect_ab_len + sect_ba_len);
    if sect_len > 0 {
        // intersection vs intersection+rest is a pure insertion
        best = best.max(normalized_similarity(sep + ab_len, sect_len + sect_ab_len));
        best = best.max(normalized_similarity(sep + ba_len, sect_len + sect_ba_len));
    }
    best
}

/// Best-scoring entry for `query`, ties broken by corpus order.
pub fn best_match(query: &str, entries: &[QaEntry]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, entry) in entries.iter().enumerate() {
        let score = token_set_ratio(query, &entry.question);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

/// Run the fuzzy stage: pick the best entry, then apply the threshold and
/// keyword guard.
///
/// Returns `None` only for an empty corpus. Otherwise the evaluation is
/// returned whether or not it was accepted, so callers can report it.
pub fn evaluate(query: &str, entries: &[QaEntry], params: &FuzzyParams) -> Option<FuzzyEvaluation> {
    let (index, score) = best_match(query, entries)?;
    let question = &entries[index].question;
    let overlap = keyword_overlap(&keywords(query), &keywords(question));
    let accepted = score >= params.threshold
        && (score > params.high_confidence || overlap >= params.min_overlap);

    Some(FuzzyEvaluation {
        index,
        question: question.clone(),
        score,
        keyword_overlap: overlap,
        accepted,
    })
}
