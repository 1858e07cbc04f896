//! `faqs bench`: run a query list against one tenant and time each answer.
//!
//! The queries file holds one query per line. Blank lines and lines
//! starting with `#` are skipped. A line may carry an expected answer after
//! a tab; the expectation `-` means "no match". Lines with an expectation
//! are scored as pass/fail.
//!
//! ```text
//! When is the shop open?	We are open 24/7.
//! tell me a joke	-
//! ```

use anyhow::{Context, Result};
use faqsense_core::models::{MatchStage, TenantId};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::engine::Engine;
use crate::knowledge::KnowledgeSource;

const NO_MATCH: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchQuery {
    pub query: String,
    /// `Some(None)` expects no match.
    pub expected: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct BenchRecord {
    pub query: String,
    pub stage: Option<MatchStage>,
    pub answer: Option<String>,
    pub latency: Duration,
    pub error: Option<String>,
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchSummary {
    pub total: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub semantic: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub checked: usize,
    pub passed: usize,
    pub mean: Duration,
    pub p50: Duration,
    pub max: Duration,
}

/// Parse a queries file body.
pub fn parse_queries(content: &str) -> Vec<BenchQuery> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|line| match line.split_once('\t') {
            Some((query, expected)) => {
                let expected = expected.trim();
                BenchQuery {
                    query: query.trim().to_string(),
                    expected: Some((expected != NO_MATCH).then(|| expected.to_string())),
                }
            }
            None => BenchQuery {
                query: line.trim().to_string(),
                expected: None,
            },
        })
        .collect()
}

/// Run every query in order and collect one record per query.
pub fn run_queries<S: KnowledgeSource>(
    engine: &Engine<S>,
    tenant_id: TenantId,
    locator: &str,
    queries: &[BenchQuery],
) -> Vec<BenchRecord> {
    queries
        .iter()
        .map(|q| {
            let start = Instant::now();
            let result = engine.find_answer(tenant_id, locator, &q.query);
            let latency = start.elapsed();

            let (stage, answer, error) = match result {
                Ok(Some(m)) => (Some(m.stage), Some(m.answer), None),
                Ok(None) => (None, None, None),
                Err(err) => {
                    warn!(query = %q.query, error = %format!("{err:#}"), "bench query failed");
                    (None, None, Some(format!("{err:#}")))
                }
            };
            let passed = match &q.expected {
                Some(expected) if error.is_none() => Some(*expected == answer),
                Some(_) => Some(false),
                None => None,
            };

            BenchRecord {
                query: q.query.clone(),
                stage,
                answer,
                latency,
                error,
                passed,
            }
        })
        .collect()
}

pub fn summarize(records: &[BenchRecord]) -> BenchSummary {
    let mut summary = BenchSummary {
        total: records.len(),
        ..BenchSummary::default()
    };
    for r in records {
        match (r.stage, &r.error) {
            (_, Some(_)) => summary.errors += 1,
            (Some(MatchStage::Exact), None) => summary.exact += 1,
            (Some(MatchStage::Fuzzy), None) => summary.fuzzy += 1,
            (Some(MatchStage::Semantic), None) => summary.semantic += 1,
            (None, None) => summary.unmatched += 1,
        }
        if let Some(passed) = r.passed {
            summary.checked += 1;
            if passed {
                summary.passed += 1;
            }
        }
    }

    let mut latencies: Vec<Duration> = records.iter().map(|r| r.latency).collect();
    latencies.sort();
    if let Some(max) = latencies.last() {
        summary.max = *max;
        summary.p50 = latencies[(latencies.len() - 1) / 2];
        summary.mean = latencies.iter().sum::<Duration>() / latencies.len() as u32;
    }
    summary
}

pub fn run_bench<S: KnowledgeSource>(
    engine: &Engine<S>,
    tenant_id: TenantId,
    locator: &str,
    queries_path: &Path,
) -> Result<()> {
    let content = std::fs::read_to_string(queries_path)
        .with_context(|| format!("Failed to read queries file: {}", queries_path.display()))?;
    let queries = parse_queries(&content);
    if queries.is_empty() {
        println!("No queries.");
        return Ok(());
    }

    let records = run_queries(engine, tenant_id, locator, &queries);
    for r in &records {
        let mark = match r.passed {
            Some(true) => "ok  ",
            Some(false) => "FAIL",
            None => "    ",
        };
        let stage = match (r.stage, &r.error) {
            (Some(stage), _) => stage.to_string(),
            (None, Some(_)) => "error".to_string(),
            (None, None) => "none".to_string(),
        };
        println!(
            "{} {:>9.2}ms  {:<8}  {:?} -> {}",
            mark,
            r.latency.as_secs_f64() * 1000.0,
            stage,
            r.query,
            r.answer.as_deref().or(r.error.as_deref()).unwrap_or("-")
        );
    }

    let s = summarize(&records);
    println!();
    println!(
        "{} queries: {} exact, {} fuzzy, {} semantic, {} unmatched, {} errors",
        s.total, s.exact, s.fuzzy, s.semantic, s.unmatched, s.errors
    );
    if s.checked > 0 {
        println!("expectations: {}/{} passed", s.passed, s.checked);
    }
    println!(
        "latency: mean {:.2}ms, p50 {:.2}ms, max {:.2}ms",
        s.mean.as_secs_f64() * 1000.0,
        s.p50.as_secs_f64() * 1000.0,
        s.max.as_secs_f64() * 1000.0
    );
    let stats = engine.embedding_cache_stats();
    println!(
        "embedding cache ({}): {} hits, {} misses",
        engine.provider().model_name(),
        stats.hits,
        stats.misses
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::DisabledProvider;
    use crate::knowledge::MemorySource;
    use faqsense_core::models::QaEntry;
    use std::sync::Arc;

    fn record(stage: Option<MatchStage>, ms: u64, error: bool) -> BenchRecord {
        BenchRecord {
            query: "q".into(),
            stage,
            answer: None,
            latency: Duration::from_millis(ms),
            error: error.then(|| "boom".to_string()),
            passed: None,
        }
    }

    #[test]
    fn test_parse_queries() {
        let queries = parse_queries("# header\nfirst\n\n second \t Answer.\nthird\t-\n");
        assert_eq!(
            queries,
            vec![
                BenchQuery {
                    query: "first".into(),
                    expected: None
                },
                BenchQuery {
                    query: "second".into(),
                    expected: Some(Some("Answer.".into()))
                },
                BenchQuery {
                    query: "third".into(),
                    expected: Some(None)
                },
            ]
        );
    }

    #[test]
    fn test_summarize_counts_and_latency() {
        let records = vec![
            record(Some(MatchStage::Exact), 1, false),
            record(Some(MatchStage::Fuzzy), 3, false),
            record(None, 2, false),
            record(None, 10, true),
        ];
        let s = summarize(&records);
        assert_eq!((s.exact, s.fuzzy, s.semantic), (1, 1, 0));
        assert_eq!((s.unmatched, s.errors), (1, 1));
        assert_eq!(s.max, Duration::from_millis(10));
        assert_eq!(s.p50, Duration::from_millis(2));
        assert_eq!(s.mean, Duration::from_millis(4));
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), BenchSummary::default());
    }

    #[test]
    fn test_run_queries_checks_expectations() {
        let source = MemorySource::new();
        source.insert("kb", vec![QaEntry::new("Do you offer refunds?", "Yes.")]);
        let engine = Engine::new(source, Arc::new(DisabledProvider), &Config::default());

        let queries = parse_queries("DO YOU OFFER REFUNDS?\tYes.\nDo you offer refinds?\tNo.\ntell me a joke\t-\n");
        let records = run_queries(&engine, 1, "kb", &queries);

        assert_eq!(records[0].stage, Some(MatchStage::Exact));
        assert_eq!(records[0].passed, Some(true));
        assert_eq!(records[1].stage, Some(MatchStage::Fuzzy));
        assert_eq!(records[1].passed, Some(false));
        // reaches the semantic stage with no provider
        assert!(records[2].error.is_some());
        assert_eq!(records[2].passed, Some(false));
    }
}
