//! Embedding Cache: memoized question embeddings per corpus snapshot.
//!
//! Entries are keyed by tenant, model, and a digest of the exact ordered
//! question list. Editing, adding, removing, or reordering a question
//! yields a new key; the superseded entry simply ages out of the LRU.

use anyhow::{bail, Result};
use faqsense_core::embedding::EmbeddingProvider;
use faqsense_core::models::{QaEntry, TenantId};
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Question embeddings for one corpus snapshot, aligned with its entries.
pub type EmbeddingSet = Arc<Vec<Vec<f32>>>;

/// Identity of a corpus snapshot under a given model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorpusKey {
    pub tenant_id: TenantId,
    pub model: String,
    pub digest: String,
}

impl CorpusKey {
    pub fn new(tenant_id: TenantId, model: &str, entries: &[QaEntry]) -> Self {
        Self {
            tenant_id,
            model: model.to_string(),
            digest: corpus_digest(entries),
        }
    }
}

/// SHA-256 over the length-prefixed questions, in order.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` distinct.
pub fn corpus_digest(entries: &[QaEntry]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((entries.len() as u64).to_le_bytes());
    for entry in entries {
        let bytes = entry.question.as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// LRU-bounded map from [`CorpusKey`] to [`EmbeddingSet`].
///
/// The provider is called outside the lock, so concurrent misses on the
/// same snapshot may embed twice; both results are identical and the
/// second insert wins.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<CorpusKey, EmbeddingSet>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached embeddings for this snapshot, computing them on a
    /// miss.
    ///
    /// # Errors
    ///
    /// Propagates provider failures, and fails if the provider returns a
    /// different number of vectors than there are questions.
    pub fn get_or_embed(
        &self,
        tenant_id: TenantId,
        entries: &[QaEntry],
        provider: &dyn EmbeddingProvider,
    ) -> Result<EmbeddingSet> {
        let key = CorpusKey::new(tenant_id, provider.model_name(), entries);

        if let Some(set) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(set));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let questions: Vec<String> = entries.iter().map(|e| e.question.clone()).collect();
        debug!(
            tenant_id,
            questions = questions.len(),
            model = provider.model_name(),
            "embedding corpus"
        );
        let vectors = provider.embed(&questions)?;
        if vectors.len() != questions.len() {
            bail!(
                "embedding provider {} returned {} vectors for {} questions",
                provider.model_name(),
                vectors.len(),
                questions.len()
            );
        }

        let set: EmbeddingSet = Arc::new(vectors);
        self.lock().put(key, Arc::clone(&set));
        Ok(set)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CorpusKey, EmbeddingSet>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
