//! Core data models shared by the matching stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tenant (one chatbot and its knowledge base).
pub type TenantId = u64;

/// One curated question/answer pair.
///
/// Entries are immutable once loaded. The same question may appear more
/// than once in a table; the first occurrence wins on an exact match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

impl QaEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// The cascade stage that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Exact,
    Fuzzy,
    Semantic,
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchStage::Exact => "exact",
            MatchStage::Fuzzy => "fuzzy",
            MatchStage::Semantic => "semantic",
        };
        f.write_str(label)
    }
}

/// An accepted answer.
///
/// `matched_question` is the original corpus question (not the visitor's
/// text) and is handed back for the caller's optional hit counting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqMatch {
    pub answer: String,
    pub matched_question: String,
    pub stage: MatchStage,
    /// Position of the matched entry in the knowledge table.
    pub index: usize,
    /// Stage-specific score: `100.0` for exact, the token-set ratio for
    /// fuzzy, cosine similarity for semantic.
    pub score: f64,
}

impl FaqMatch {
    pub fn from_entry(entry: &QaEntry, index: usize, stage: MatchStage, score: f64) -> Self {
        Self {
            answer: entry.answer.clone(),
            matched_question: entry.question.clone(),
            stage,
            index,
            score,
        }
    }
}

/// A semantic retrieval candidate, alive only for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub index: usize,
    /// Raw cosine similarity to the query.
    pub score: f32,
    /// Number of content keywords shared with the query.
    pub keyword_overlap: usize,
    pub question: String,
}
