//! Knowledge Store: per-tenant FAQ tables with revision-checked caching.
//!
//! A [`KnowledgeSource`] supplies tables plus a revision marker (for CSV
//! files, the modification time). [`KnowledgeStore`] keeps the most recently
//! used tables in memory and re-reads a table only when its source revision
//! has advanced. Tables are replaced wholesale, never patched.
//!
//! The store fails closed: an absent, unreadable, or malformed source
//! yields an empty table, which the engine treats as "no possible match".

use anyhow::{anyhow, Context, Result};
use faqsense_core::models::{QaEntry, TenantId};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Column holding the curated question.
pub const QUESTION_COLUMN: &str = "Question";
/// Column holding the curated answer.
pub const ANSWER_COLUMN: &str = "Answer";

/// Monotonic revision marker of a knowledge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u128);

impl From<SystemTime> for Revision {
    fn from(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Revision(nanos)
    }
}

/// Backing collaborator that owns the durable FAQ tables.
pub trait KnowledgeSource: Send + Sync {
    /// Current revision of the table at `locator`, or `None` if absent.
    fn revision(&self, locator: &str) -> Result<Option<Revision>>;

    /// Read the full table at `locator`, preserving row order.
    fn read_table(&self, tenant_id: TenantId, locator: &str) -> Result<Vec<QaEntry>>;
}

/// Conventional table location for a tenant: `<root>/<tenant>/faqs.csv`.
pub fn tenant_locator(root: &Path, tenant_id: TenantId) -> PathBuf {
    root.join(tenant_id.to_string()).join("faqs.csv")
}

/// An explicit table path if given, else the tenant's conventional one.
pub fn resolve_locator(root: &Path, tenant_id: TenantId, explicit: Option<&Path>) -> String {
    match explicit {
        Some(path) => path.to_string_lossy().into_owned(),
        None => tenant_locator(root, tenant_id).to_string_lossy().into_owned(),
    }
}

// ============ CSV Source ============

/// CSV files with a header row naming `Question` and `Answer` columns.
///
/// Column order is free and extra columns are ignored. Rows whose question
/// is blank are skipped; short rows read missing cells as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSource;

impl KnowledgeSource for CsvSource {
    fn revision(&self, locator: &str) -> Result<Option<Revision>> {
        match std::fs::metadata(locator) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .with_context(|| format!("No modification time for {}", locator))?;
                Ok(Some(Revision::from(modified)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", locator)),
        }
    }

    fn read_table(&self, _tenant_id: TenantId, locator: &str) -> Result<Vec<QaEntry>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(locator)
            .with_context(|| format!("Failed to open knowledge table: {}", locator))?;
        parse_table(&mut reader).with_context(|| format!("Malformed knowledge table: {}", locator))
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or_else(|| anyhow!("missing '{}' column", name))
}

/// Parse a CSV table into entries.
pub fn parse_table<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Vec<QaEntry>> {
    let headers = reader.headers()?.clone();
    let q_idx = column_index(&headers, QUESTION_COLUMN)?;
    let a_idx = column_index(&headers, ANSWER_COLUMN)?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        let question = record.get(q_idx).unwrap_or("");
        if question.trim().is_empty() {
            continue;
        }
        let answer = record.get(a_idx).unwrap_or("");
        entries.push(QaEntry::new(question, answer));
    }
    Ok(entries)
}

// ============ Memory Source ============

/// In-process tables with explicit revisions.
///
/// Every [`insert`](MemorySource::insert) bumps a shared clock, so a
/// replaced table always carries a newer revision.
#[derive(Default)]
pub struct MemorySource {
    tables: RwLock<HashMap<String, (Revision, Vec<QaEntry>)>>,
    clock: AtomicU64,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the table at `locator`.
    pub fn insert(&self, locator: &str, entries: Vec<QaEntry>) -> Revision {
        let revision = Revision(u128::from(self.clock.fetch_add(1, Ordering::SeqCst) + 1));
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.to_string(), (revision, entries));
        revision
    }

    pub fn remove(&self, locator: &str) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(locator);
    }

    /// Number of full table reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl KnowledgeSource for MemorySource {
    fn revision(&self, locator: &str) -> Result<Option<Revision>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(locator).map(|(rev, _)| *rev))
    }

    fn read_table(&self, _tenant_id: TenantId, locator: &str) -> Result<Vec<QaEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(locator)
            .map(|(_, entries)| entries.clone())
            .ok_or_else(|| anyhow!("no table at {}", locator))
    }
}

// ============ Store ============

struct CachedTable {
    locator: String,
    revision: Revision,
    entries: Arc<[QaEntry]>,
}

/// Revision-checked, LRU-bounded cache of tenant tables.
///
/// Concurrent first loads of the same changed table may both read the
/// source; the later write simply replaces an identical entry.
pub struct KnowledgeStore<S: KnowledgeSource = CsvSource> {
    source: S,
    cache: Mutex<LruCache<TenantId, CachedTable>>,
}

impl<S: KnowledgeSource> KnowledgeStore<S> {
    pub fn new(source: S, capacity: NonZeroUsize) -> Self {
        Self {
            source,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the table for `tenant_id` from `locator`.
    ///
    /// Returns the cached table unless the source revision advanced or the
    /// tenant now points at a different locator. Never fails: problems are
    /// logged and produce an empty table.
    pub fn load(&self, tenant_id: TenantId, locator: &str) -> Arc<[QaEntry]> {
        let revision = match self.source.revision(locator) {
            Ok(Some(rev)) => rev,
            Ok(None) => {
                debug!(tenant_id, locator, "knowledge source absent");
                self.evict(tenant_id);
                return empty_table();
            }
            Err(err) => {
                warn!(tenant_id, locator, error = %format!("{err:#}"), "knowledge source unreadable");
                self.evict(tenant_id);
                return empty_table();
            }
        };

        if let Some(entries) = self.cached(tenant_id, locator, revision) {
            return entries;
        }

        match self.source.read_table(tenant_id, locator) {
            Ok(entries) => {
                let entries: Arc<[QaEntry]> = entries.into();
                info!(tenant_id, locator, entries = entries.len(), "knowledge table loaded");
                self.lock().put(
                    tenant_id,
                    CachedTable {
                        locator: locator.to_string(),
                        revision,
                        entries: Arc::clone(&entries),
                    },
                );
                entries
            }
            Err(err) => {
                warn!(tenant_id, locator, error = %format!("{err:#}"), "knowledge table rejected");
                self.evict(tenant_id);
                empty_table()
            }
        }
    }

    /// Number of tenants currently cached.
    pub fn cached_tenants(&self) -> usize {
        self.lock().len()
    }

    fn cached(&self, tenant_id: TenantId, locator: &str, revision: Revision) -> Option<Arc<[QaEntry]>> {
        let mut cache = self.lock();
        let table = cache.get(&tenant_id)?;
        if table.locator == locator && revision <= table.revision {
            Some(Arc::clone(&table.entries))
        } else {
            debug!(tenant_id, locator, "knowledge table stale");
            None
        }
    }

    fn evict(&self, tenant_id: TenantId) {
        self.lock().pop(&tenant_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<TenantId, CachedTable>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn empty_table() -> Arc<[QaEntry]> {
    Arc::from(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn refunds() -> Vec<QaEntry> {
        vec![QaEntry::new("Do you offer refunds?", "Refunds within 30 days.")]
    }

    #[test]
    fn test_tenant_locator_layout() {
        let path = tenant_locator(Path::new("/srv/data"), 42);
        assert_eq!(path, PathBuf::from("/srv/data/42/faqs.csv"));
    }

    #[test]
    fn test_explicit_locator_wins() {
        let root = Path::new("/srv/data");
        assert_eq!(
            resolve_locator(root, 3, Some(Path::new("/tmp/kb.csv"))),
            "/tmp/kb.csv"
        );
        assert_eq!(resolve_locator(root, 3, None), "/srv/data/3/faqs.csv");
    }

    #[test]
    fn test_parse_table_any_column_order() {
        let data = "Answer,Extra,Question\nYes.,x,Is it free?\nNo.,y,  \n";
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());
        let entries = parse_table(&mut reader).unwrap();
        assert_eq!(entries, vec![QaEntry::new("Is it free?", "Yes.")]);
    }

    #[test]
    fn test_parse_table_quoted_fields() {
        let data = "Question,Answer\n\"Hours, please?\",\"We are open\n24/7.\"\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let entries = parse_table(&mut reader).unwrap();
        assert_eq!(entries[0].question, "Hours, please?");
        assert_eq!(entries[0].answer, "We are open\n24/7.");
    }

    #[test]
    fn test_parse_table_missing_column() {
        let data = "Q,A\nx,y\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let err = parse_table(&mut reader).unwrap_err();
        assert!(err.to_string().contains("Question"));
    }

    #[test]
    fn test_csv_source_missing_file_is_absent() {
        let source = CsvSource;
        assert_eq!(source.revision("/no/such/faqs.csv").unwrap(), None);
    }

    #[test]
    fn test_csv_store_loads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faqs.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Question,Answer").unwrap();
        writeln!(file, "Do you offer refunds?,Refunds within 30 days.").unwrap();
        drop(file);

        let store = KnowledgeStore::new(CsvSource, capacity(4));
        let locator = path.to_str().unwrap();
        let first = store.load(1, locator);
        let second = store.load(1, locator);
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_malformed_csv_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faqs.csv");
        std::fs::write(&path, "Title,Body\nx,y\n").unwrap();
        let store = KnowledgeStore::new(CsvSource, capacity(4));
        assert!(store.load(1, path.to_str().unwrap()).is_empty());
        assert_eq!(store.cached_tenants(), 0);
    }

    #[test]
    fn test_absent_source_yields_empty() {
        let store = KnowledgeStore::new(MemorySource::new(), capacity(4));
        assert!(store.load(7, "missing").is_empty());
    }

    #[test]
    fn test_reload_only_when_revision_advances() {
        let source = MemorySource::new();
        source.insert("t1", refunds());
        let store = KnowledgeStore::new(source, capacity(4));

        assert_eq!(store.load(1, "t1").len(), 1);
        assert_eq!(store.load(1, "t1").len(), 1);
        assert_eq!(store.source().read_count(), 1);

        let mut updated = refunds();
        updated.push(QaEntry::new("Where are you?", "Berlin."));
        store.source().insert("t1", updated);

        let reloaded = store.load(1, "t1");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(store.source().read_count(), 2);
    }

    #[test]
    fn test_removed_source_drops_cache_entry() {
        let source = MemorySource::new();
        source.insert("t1", refunds());
        let store = KnowledgeStore::new(source, capacity(4));
        assert_eq!(store.load(1, "t1").len(), 1);

        store.source().remove("t1");
        assert!(store.load(1, "t1").is_empty());
        assert_eq!(store.cached_tenants(), 0);
    }

    #[test]
    fn test_locator_change_forces_reload() {
        let source = MemorySource::new();
        source.insert("b", vec![QaEntry::new("What is your pricing?", "Cheap.")]);
        source.insert("a", refunds());
        let store = KnowledgeStore::new(source, capacity(4));

        assert_eq!(store.load(1, "a")[0].answer, "Refunds within 30 days.");
        // "b" carries an older revision but is a different table
        assert_eq!(store.load(1, "b")[0].answer, "Cheap.");
    }

    #[test]
    fn test_lru_capacity_bounds_tenants() {
        let source = MemorySource::new();
        source.insert("t", refunds());
        let store = KnowledgeStore::new(source, capacity(2));
        store.load(1, "t");
        store.load(2, "t");
        store.load(3, "t");
        assert_eq!(store.cached_tenants(), 2);
        // tenant 1 was evicted and must be read again
        store.load(1, "t");
        assert_eq!(store.source().read_count(), 4);
    }
}
