//! `faqs ask` and `faqs chat`: answer visitor questions.
//!
//! Answers go to stdout; diagnostics go to the log on stderr. When nothing
//! matches, the configured fallback message is printed instead.

use anyhow::Result;
use faqsense_core::models::{FaqMatch, TenantId};
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing::error;

use crate::engine::{Engine, MatchReport};
use crate::knowledge::KnowledgeSource;

/// JSON shape of a single answer.
#[derive(Debug, Serialize)]
pub struct AskResponse<'a> {
    pub query: &'a str,
    pub answer: &'a str,
    pub matched: Option<&'a FaqMatch>,
}

pub fn run_ask<S: KnowledgeSource>(
    engine: &Engine<S>,
    tenant_id: TenantId,
    locator: &str,
    query: &str,
    fallback: &str,
    explain: bool,
    json: bool,
) -> Result<()> {
    let report = engine.explain(tenant_id, locator, query)?;
    let mut out = std::io::stdout().lock();

    if json {
        if explain {
            serde_json::to_writer_pretty(&mut out, &report)?;
        } else {
            let response = AskResponse {
                query,
                answer: answer_text(report.outcome.as_ref(), fallback),
                matched: report.outcome.as_ref(),
            };
            serde_json::to_writer_pretty(&mut out, &response)?;
        }
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{}", answer_text(report.outcome.as_ref(), fallback))?;
    if let Some(m) = &report.outcome {
        writeln!(
            out,
            "    matched: {:?} ({}, score {:.3})",
            m.matched_question, m.stage, m.score
        )?;
    }
    if explain {
        write_explanation(&mut out, &report)?;
    }
    Ok(())
}

/// Answer each non-blank line of `input`, one reply per line on `output`.
///
/// A failing query is logged and answered with the fallback; the session
/// continues. Returns the number of questions answered.
pub fn run_chat<S: KnowledgeSource, R: BufRead, W: Write>(
    engine: &Engine<S>,
    tenant_id: TenantId,
    locator: &str,
    fallback: &str,
    input: R,
    mut output: W,
) -> Result<usize> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        let reply = match engine.find_answer(tenant_id, locator, query) {
            Ok(outcome) => answer_text(outcome.as_ref(), fallback).to_string(),
            Err(err) => {
                error!(error = %format!("{err:#}"), "query failed");
                fallback.to_string()
            }
        };
        writeln!(output, "{}", reply)?;
        output.flush()?;
        answered += 1;
    }
    Ok(answered)
}

fn answer_text<'a>(outcome: Option<&'a FaqMatch>, fallback: &'a str) -> &'a str {
    outcome.map(|m| m.answer.as_str()).unwrap_or(fallback)
}

fn write_explanation<W: Write>(out: &mut W, report: &MatchReport) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "corpus: {} entries", report.corpus_size)?;

    match report.exact {
        Some(index) => writeln!(out, "exact: entry #{}", index)?,
        None => writeln!(out, "exact: none")?,
    }

    match &report.fuzzy {
        Some(f) => writeln!(
            out,
            "fuzzy: {:?} score={:.2} overlap={} accepted={}",
            f.question, f.score, f.keyword_overlap, f.accepted
        )?,
        None => writeln!(out, "fuzzy: not run")?,
    }

    match &report.semantic {
        Some(s) => {
            writeln!(out, "semantic: {:?}", s.verdict)?;
            for (rank, c) in s.candidates.iter().enumerate() {
                writeln!(
                    out,
                    "  {}. {:?} score={:.4} overlap={}",
                    rank + 1,
                    c.question,
                    c.score,
                    c.keyword_overlap
                )?;
            }
        }
        None => writeln!(out, "semantic: not run")?,
    }
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

    const FALLBACK: &str = "Sorry?";

    fn engine() -> Engine<MemorySource> {
        let source = MemorySource::new();
        source.insert(
            "kb",
            vec![QaEntry::new("Do you offer refunds?", "Refunds within 30 days.")],
        );
        Engine::new(source, Arc::new(DisabledProvider), &Config::default())
    }

    #[test]
    fn test_chat_answers_each_line() {
        let input = "do you offer refunds?\n\n   \nDo you offer refinds?\n";
        let mut output = Vec::new();
        let answered = run_chat(&engine(), 1, "kb", FALLBACK, input.as_bytes(), &mut output).unwrap();
        assert_eq!(answered, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Refunds within 30 days.\nRefunds within 30 days.\n"
        );
    }

    #[test]
    fn test_chat_survives_provider_failure() {
        let input = "What is the capital of Peru\ndo you offer refunds?\n";
        let mut output = Vec::new();
        run_chat(&engine(), 1, "kb", FALLBACK, input.as_bytes(), &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Sorry?\nRefunds within 30 days.\n"
        );
    }

    #[test]
    fn test_explanation_lists_stages() {
        let report = engine().explain(1, "kb", "Do you offer refinds?").unwrap();
        let mut out = Vec::new();
        write_explanation(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("corpus: 1 entries"));
        assert!(text.contains("exact: none"));
        assert!(text.contains("accepted=true"));
        assert!(text.contains("semantic: not run"));
    }
}
