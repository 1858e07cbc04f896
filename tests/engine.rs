use anyhow::{anyhow, Result};
use faqsense::config::Config;
use faqsense::embedding::{EmbeddingProvider, HashedProvider};
use faqsense::knowledge::MemorySource;
use faqsense::{Engine, MatchStage, QaEntry};
use faqsense_core::semantic::SemanticVerdict;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Returns fixed vectors for known texts and records every batch it sees.
struct ScriptedProvider {
    vectors: HashMap<String, Vec<f32>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    fn new(vectors: &[(&str, Vec<f32>)]) -> Arc<Self> {
        Arc::new(Self {
            vectors: vectors
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl EmbeddingProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }
    fn dims(&self) -> usize {
        2
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.to_vec());
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| anyhow!("no vector scripted for {:?}", t))
            })
            .collect()
    }
}

/// Unit vector with the given cosine against `[1, 0]`.
fn at(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).sqrt()]
}

fn refunds() -> Vec<QaEntry> {
    vec![QaEntry::new("Do you offer refunds?", "Refunds within 30 days.")]
}

fn engine_with(
    tables: &[(&str, Vec<QaEntry>)],
    provider: Arc<dyn EmbeddingProvider>,
) -> Engine<MemorySource> {
    let source = MemorySource::new();
    for (locator, entries) in tables {
        source.insert(locator, entries.clone());
    }
    Engine::new(source, provider, &Config::default())
}

#[test]
fn test_exact_match_ignores_case_and_whitespace() {
    let provider = ScriptedProvider::new(&[]);
    let engine = engine_with(&[("kb", refunds())], provider.clone());

    let m = engine
        .find_answer(1, "kb", "  do you offer REFUNDS?  ")
        .unwrap()
        .unwrap();
    assert_eq!(m.answer, "Refunds within 30 days.");
    assert_eq!(m.matched_question, "Do you offer refunds?");
    assert_eq!(m.stage, MatchStage::Exact);
    assert!(provider.calls().is_empty());
}

#[test]
fn test_exact_match_first_duplicate_wins() {
    let provider = ScriptedProvider::new(&[]);
    let table = vec![
        QaEntry::new("Hours?", "First."),
        QaEntry::new("HOURS?", "Second."),
    ];
    let engine = engine_with(&[("kb", table)], provider);
    let m = engine.find_answer(1, "kb", "hours?").unwrap().unwrap();
    assert_eq!(m.answer, "First.");
    assert_eq!(m.index, 0);
}

#[test]
fn test_typo_resolved_by_fuzzy_stage() {
    let provider = ScriptedProvider::new(&[]);
    let engine = engine_with(&[("kb", refunds())], provider.clone());

    let m = engine
        .find_answer(1, "kb", "Do you offer refinds?")
        .unwrap()
        .unwrap();
    assert_eq!(m.answer, "Refunds within 30 days.");
    assert_eq!(m.stage, MatchStage::Fuzzy);
    assert!(m.score >= 80.0);
    assert!(provider.calls().is_empty());
}

#[test]
fn test_tenants_are_isolated() {
    let provider = ScriptedProvider::new(&[
        ("What is your pricing?", vec![1.0, 0.0]),
        ("Where is your office?", vec![0.2, 0.98]),
    ]);
    let engine = engine_with(
        &[
            ("a", vec![QaEntry::new("What is your pricing?", "From $10.")]),
            ("b", vec![QaEntry::new("Where is your office?", "Berlin.")]),
        ],
        provider,
    );

    assert_eq!(engine.find_answer(1, "a", "Where is your office?").unwrap(), None);
    let m = engine.find_answer(2, "b", "Where is your office?").unwrap().unwrap();
    assert_eq!(m.answer, "Berlin.");
}

#[test]
fn test_close_candidates_with_equal_overlap_are_ambiguous() {
    let provider = ScriptedProvider::new(&[
        ("I want to buy a car", at(0.95)),
        ("I want to rent a car", at(0.94)),
        ("I need a car", vec![1.0, 0.0]),
    ]);
    let engine = engine_with(
        &[(
            "kb",
            vec![
                QaEntry::new("I want to buy a car", "Buying info..."),
                QaEntry::new("I want to rent a car", "Renting info..."),
            ],
        )],
        provider,
    );

    let report = engine.explain(1, "kb", "I need a car").unwrap();
    assert_eq!(report.outcome, None);
    let fuzzy = report.fuzzy.unwrap();
    assert!(!fuzzy.accepted);
    let semantic = report.semantic.unwrap();
    assert!(matches!(semantic.verdict, SemanticVerdict::Ambiguous { .. }));
    assert_eq!(semantic.candidates.len(), 2);
    assert_eq!(semantic.candidates[0].keyword_overlap, 1);
    assert_eq!(semantic.candidates[1].keyword_overlap, 1);
}

#[test]
fn test_lone_confident_candidate_is_accepted() {
    let provider = ScriptedProvider::new(&[
        ("I want to buy a car", at(0.95)),
        ("I need a car", vec![1.0, 0.0]),
    ]);
    let engine = engine_with(
        &[("kb", vec![QaEntry::new("I want to buy a car", "Buying info...")])],
        provider,
    );

    let m = engine.find_answer(1, "kb", "I need a car").unwrap().unwrap();
    assert_eq!(m.stage, MatchStage::Semantic);
    assert_eq!(m.answer, "Buying info...");
    assert!((m.score - 0.95).abs() < 1e-4);
}

#[test]
fn test_corpus_embedded_once_per_snapshot() {
    let provider = ScriptedProvider::new(&[
        ("I want to buy a car", at(0.95)),
        ("I need a car", vec![1.0, 0.0]),
        ("Could I purchase a car", at(0.9)),
    ]);
    let engine = engine_with(
        &[("kb", vec![QaEntry::new("I want to buy a car", "Buying info...")])],
        provider.clone(),
    );

    engine.find_answer(1, "kb", "I need a car").unwrap();
    engine.find_answer(1, "kb", "Could I purchase a car").unwrap();

    let corpus_batches = provider
        .calls()
        .iter()
        .filter(|batch| batch.as_slice() == ["I want to buy a car".to_string()])
        .count();
    assert_eq!(corpus_batches, 1);
    // two queries, each embedded fresh
    assert_eq!(provider.calls().len(), 3);
    let stats = engine.embedding_cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[test]
fn test_edited_table_is_reloaded_and_reembedded() {
    let provider = ScriptedProvider::new(&[
        ("I want to buy a car", at(0.95)),
        ("I want to lease a car", at(0.3)),
        ("I need a car", vec![1.0, 0.0]),
    ]);
    let engine = engine_with(
        &[("kb", vec![QaEntry::new("I want to buy a car", "Buying info...")])],
        provider.clone(),
    );
    assert!(engine.find_answer(1, "kb", "I need a car").unwrap().is_some());

    engine
        .store()
        .source()
        .insert("kb", vec![QaEntry::new("I want to lease a car", "Leasing info...")]);

    assert_eq!(engine.find_answer(1, "kb", "I need a car").unwrap(), None);
    assert_eq!(engine.store().source().read_count(), 2);
    assert_eq!(engine.embedding_cache_stats().misses, 2);
}

#[test]
fn test_provider_failure_propagates_from_semantic_stage() {
    let provider = ScriptedProvider::new(&[]);
    let engine = engine_with(&[("kb", refunds())], provider);
    let err = engine
        .find_answer(1, "kb", "Where can I park my bike")
        .unwrap_err();
    assert!(err.to_string().contains("no vector scripted"));
}

#[test]
fn test_hashed_provider_end_to_end() {
    let engine = engine_with(
        &[(
            "kb",
            vec![
                QaEntry::new("What are your opening hours?", "We are open 24/7."),
                QaEntry::new("Do you offer refunds?", "Yes within 30 days."),
            ],
        )],
        Arc::new(HashedProvider::new(256)),
    );

    let m = engine
        .find_answer(1, "kb", "what hours are you opening")
        .unwrap()
        .unwrap();
    assert_eq!(m.stage, MatchStage::Semantic);
    assert_eq!(m.answer, "We are open 24/7.");

    assert_eq!(engine.find_answer(1, "kb", "tell me a joke").unwrap(), None);
}

#[test]
fn test_blank_query_and_empty_table_skip_provider() {
    let provider = ScriptedProvider::new(&[]);
    let engine = engine_with(&[("empty", Vec::new())], provider.clone());
    assert_eq!(engine.find_answer(1, "empty", "anything at all").unwrap(), None);
    assert_eq!(engine.find_answer(1, "missing", "anything at all").unwrap(), None);
    assert_eq!(engine.find_answer(1, "empty", "\t  ").unwrap(), None);
    assert!(provider.calls().is_empty());
}
