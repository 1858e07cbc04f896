//! Cascade Orchestrator: exact, then fuzzy, then semantic.
//!
//! ```text
//! query ──► KnowledgeStore::load ──► exact ──► fuzzy ──► semantic ──► answer | none
//!                                      │         │           │
//!                                      └─ accept ┴─ accept ──┘
//! ```
//!
//! The first stage that accepts decides the outcome; there is no
//! backtracking and no retry. Only the semantic stage touches the
//! embedding provider, and its failures are returned to the caller as
//! errors rather than downgraded to "no match".

use anyhow::Result;
use faqsense_core::exact::exact_match;
use faqsense_core::fuzzy::{self, FuzzyEvaluation, FuzzyParams};
use faqsense_core::models::{FaqMatch, MatchStage, QaEntry, TenantId};
use faqsense_core::semantic::{self, SemanticEvaluation, SemanticParams};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheStats, EmbeddingCache};
use crate::config::Config;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::knowledge::{CsvSource, KnowledgeSource, KnowledgeStore};

/// Per-stage diagnostics for one query.
///
/// Stages that never ran are `None`; `exact` is `None` when nothing matched
/// exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub outcome: Option<FaqMatch>,
    pub corpus_size: usize,
    pub exact: Option<usize>,
    pub fuzzy: Option<FuzzyEvaluation>,
    pub semantic: Option<SemanticEvaluation>,
}

impl MatchReport {
    fn empty(corpus_size: usize) -> Self {
        Self {
            outcome: None,
            corpus_size,
            exact: None,
            fuzzy: None,
            semantic: None,
        }
    }
}

/// The matching engine: owns the caches and the embedding provider.
pub struct Engine<S: KnowledgeSource = CsvSource> {
    store: KnowledgeStore<S>,
    embeddings: EmbeddingCache,
    provider: Arc<dyn EmbeddingProvider>,
    fuzzy: FuzzyParams,
    semantic: SemanticParams,
}

impl Engine<CsvSource> {
    /// Build a CSV-backed engine from configuration, initializing the
    /// embedding provider up front.
    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.embedding.is_enabled() {
            warn!("embedding provider disabled; queries reaching the semantic stage will fail");
        }
        let provider = create_provider(&config.embedding)?;
        Ok(Self::new(CsvSource, provider, config))
    }
}

impl<S: KnowledgeSource> Engine<S> {
    pub fn new(source: S, provider: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self {
            store: KnowledgeStore::new(source, capacity(config.knowledge.cache_capacity)),
            embeddings: EmbeddingCache::new(capacity(config.embedding.cache_capacity)),
            provider,
            fuzzy: config.matching.fuzzy_params(),
            semantic: config.matching.semantic_params(),
        }
    }

    pub fn store(&self) -> &KnowledgeStore<S> {
        &self.store
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn embedding_cache_stats(&self) -> CacheStats {
        self.embeddings.stats()
    }

    /// Answer `query` from the tenant's knowledge table at `locator`.
    ///
    /// Returns `Ok(None)` when no stage accepts, including for blank
    /// queries and empty or missing tables.
    ///
    /// # Errors
    ///
    /// Only when the semantic stage is reached and the embedding provider
    /// fails.
    pub fn find_answer(
        &self,
        tenant_id: TenantId,
        locator: &str,
        query: &str,
    ) -> Result<Option<FaqMatch>> {
        Ok(self.explain(tenant_id, locator, query)?.outcome)
    }

    /// Run the cascade and return what every executed stage saw.
    #[instrument(skip_all, fields(tenant_id = tenant_id, locator = %locator))]
    pub fn explain(&self, tenant_id: TenantId, locator: &str, query: &str) -> Result<MatchReport> {
        if query.trim().is_empty() {
            debug!("blank query");
            return Ok(MatchReport::empty(0));
        }

        let entries = self.store.load(tenant_id, locator);
        let mut report = MatchReport::empty(entries.len());
        if entries.is_empty() {
            debug!("empty knowledge table");
            return Ok(report);
        }

        if let Some(index) = exact_match(query, &entries) {
            debug!(index, "exact match");
            report.exact = Some(index);
            report.outcome = Some(FaqMatch::from_entry(
                &entries[index],
                index,
                MatchStage::Exact,
                100.0,
            ));
            return Ok(report);
        }

        let fuzzy = fuzzy::evaluate(query, &entries, &self.fuzzy);
        if let Some(eval) = &fuzzy {
            debug!(
                index = eval.index,
                score = eval.score,
                overlap = eval.keyword_overlap,
                accepted = eval.accepted,
                "fuzzy stage"
            );
            if eval.accepted {
                report.outcome = Some(FaqMatch::from_entry(
                    &entries[eval.index],
                    eval.index,
                    MatchStage::Fuzzy,
                    eval.score,
                ));
            }
        }
        report.fuzzy = fuzzy;
        if report.outcome.is_some() {
            return Ok(report);
        }

        let evaluation = self.semantic_stage(tenant_id, query, &entries)?;
        debug!(
            candidates = evaluation.candidates.len(),
            verdict = ?evaluation.verdict,
            "semantic stage"
        );
        if let Some(best) = evaluation.accepted() {
            report.outcome = Some(FaqMatch::from_entry(
                &entries[best.index],
                best.index,
                MatchStage::Semantic,
                f64::from(best.score),
            ));
        }
        report.semantic = Some(evaluation);
        Ok(report)
    }

    fn semantic_stage(
        &self,
        tenant_id: TenantId,
        query: &str,
        entries: &[QaEntry],
    ) -> Result<SemanticEvaluation> {
        let corpus_vecs = self
            .embeddings
            .get_or_embed(tenant_id, entries, self.provider.as_ref())?;
        let query_vec = embed_query(self.provider.as_ref(), query)?;
        Ok(semantic::evaluate(
            query,
            &query_vec,
            entries,
            &corpus_vecs,
            &self.semantic,
        ))
    }
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}
