//! Semantic matching over precomputed embeddings.
//!
//! # Algorithm
//!
//! 1. Score every corpus question against the query by cosine similarity.
//! 2. Keep the top `K = min(top_k, corpus size)` candidates by raw score.
//! 3. Count keyword overlap between the query and each candidate question.
//! 4. Re-rank by `(keyword_overlap desc, score desc)`.
//! 5. Ambiguity guard: if the top two re-ranked candidates share the same
//!    overlap and their score gap is below `ambiguity_threshold`, reject.
//! 6. Accept iff `score >= semantic_threshold` and either
//!    `score > confidence_threshold` or `overlap >= min_overlap`.
//!
//! The guard compares candidate questions, not answers: two paraphrases
//! of the same answer can still be rejected as ambiguous.

use serde::Serialize;
use std::cmp::Ordering;

use crate::embedding::cosine_similarity;
use crate::models::{MatchCandidate, QaEntry};
use crate::text::{keyword_overlap, keywords};

/// Acceptance parameters for the semantic stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticParams {
    /// Minimum cosine similarity for any acceptance.
    pub semantic_threshold: f32,
    /// Similarity strictly above this is accepted without keyword support.
    pub confidence_threshold: f32,
    /// Minimum score gap between equally corroborated top candidates.
    pub ambiguity_threshold: f32,
    /// Shared keywords required at moderate similarity.
    pub min_overlap: usize,
    /// Upper bound on retrieved candidates.
    pub top_k: usize,
}

impl Default for SemanticParams {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.70,
            confidence_threshold: 0.85,
            ambiguity_threshold: 0.05,
            min_overlap: 1,
            top_k: 5,
        }
    }
}

/// Why the semantic stage accepted or rejected its best candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticVerdict {
    Accepted,
    /// Top two candidates tie on overlap and are closer than the threshold.
    Ambiguous { gap: f32 },
    /// Best score is below `semantic_threshold`.
    BelowThreshold,
    /// Moderate score without enough keyword overlap.
    Unsupported,
    /// Nothing to rank.
    NoCandidates,
}

/// Re-ranked candidates plus the decision taken on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticEvaluation {
    pub candidates: Vec<MatchCandidate>,
    pub verdict: SemanticVerdict,
}

impl SemanticEvaluation {
    /// The accepted candidate, if any.
    pub fn accepted(&self) -> Option<&MatchCandidate> {
        match self.verdict {
            SemanticVerdict::Accepted => self.candidates.first(),
            _ => None,
        }
    }
}

/// Indices and scores of the `k` most similar vectors, best first.
///
/// Equal scores keep corpus order.
pub fn top_k(query_vec: &[f32], corpus: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(idx, v)| (idx, cosine_similarity(query_vec, v)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k.min(corpus.len()));
    scored
}

/// Lexical corroboration first, raw similarity second.
fn rerank_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.keyword_overlap
        .cmp(&a.keyword_overlap)
        .then_with(|| b.score.total_cmp(&a.score))
}

/// Run the semantic stage.
///
/// `corpus_vecs` must be aligned with `entries`: one vector per entry, in
/// the same order.
pub fn evaluate(
    query: &str,
    query_vec: &[f32],
    entries: &[QaEntry],
    corpus_vecs: &[Vec<f32>],
    params: &SemanticParams,
) -> SemanticEvaluation {
    let query_keywords = keywords(query);

    let mut candidates: Vec<MatchCandidate> = top_k(query_vec, corpus_vecs, params.top_k)
        .into_iter()
        .filter_map(|(index, score)| {
            let question = &entries.get(index)?.question;
            Some(MatchCandidate {
                index,
                score,
                keyword_overlap: keyword_overlap(&query_keywords, &keywords(question)),
                question: question.clone(),
            })
        })
        .collect();

    // stable: equal keys keep retrieval order
    candidates.sort_by(rerank_order);

    let verdict = decide(&candidates, params);
    SemanticEvaluation {
        candidates,
        verdict,
    }
}

/// Apply the ambiguity guard and acceptance rule to re-ranked candidates.
pub fn decide(candidates: &[MatchCandidate], params: &SemanticParams) -> SemanticVerdict {
    let Some(best) = candidates.first() else {
        return SemanticVerdict::NoCandidates;
    };

    if let Some(second) = candidates.get(1) {
        if best.keyword_overlap == second.keyword_overlap {
            let gap = best.score - second.score;
            if gap < params.ambiguity_threshold {
                return SemanticVerdict::Ambiguous { gap };
            }
        }
    }

    if best.score < params.semantic_threshold {
        return SemanticVerdict::BelowThreshold;
    }
    if best.score > params.confidence_threshold || best.keyword_overlap >= params.min_overlap {
        SemanticVerdict::Accepted
    } else {
        SemanticVerdict::Unsupported
    }
}
