//! `faqs inspect`: sanity-check a tenant's knowledge table.

use anyhow::Result;
use faqsense_core::models::{QaEntry, TenantId};
use faqsense_core::text::normalize;
use std::collections::HashMap;

use crate::knowledge::{CsvSource, KnowledgeSource};

/// A question that occurs more than once, modulo case and surrounding
/// whitespace. Only the first occurrence can ever win an exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub question: String,
    pub indices: Vec<usize>,
}

/// Duplicated questions, ordered by first occurrence.
pub fn duplicate_questions(entries: &[QaEntry]) -> Vec<Duplicate> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Duplicate> = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let key = normalize(&entry.question);
        match seen.get(&key) {
            Some(&group) => groups[group].indices.push(idx),
            None => {
                seen.insert(key, groups.len());
                groups.push(Duplicate {
                    question: entry.question.clone(),
                    indices: vec![idx],
                });
            }
        }
    }
    groups.retain(|g| g.indices.len() > 1);
    groups
}

pub fn run_inspect(tenant_id: TenantId, locator: &str) -> Result<()> {
    let source = CsvSource;
    if source.revision(locator)?.is_none() {
        println!("No knowledge table for tenant {} at {}", tenant_id, locator);
        return Ok(());
    }
    let entries = source.read_table(tenant_id, locator)?;

    println!("tenant:   {}", tenant_id);
    println!("table:    {}", locator);
    println!("entries:  {}", entries.len());

    let blank_answers = entries.iter().filter(|e| e.answer.trim().is_empty()).count();
    if blank_answers > 0 {
        println!("blank answers: {}", blank_answers);
    }

    let duplicates = duplicate_questions(&entries);
    if duplicates.is_empty() {
        println!("duplicates: none");
    } else {
        println!("duplicates: {}", duplicates.len());
        for d in &duplicates {
            let rows: Vec<String> = d.indices.iter().map(|i| format!("#{}", i)).collect();
            println!("  {:?} at {}", d.question, rows.join(", "));
        }
    }
    Ok(())
}
