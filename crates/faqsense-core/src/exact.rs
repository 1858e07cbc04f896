//! Exact matching on normalized question text.

use crate::models::QaEntry;
use crate::text::normalize;

/// Find the first entry whose normalized question equals the normalized
/// query.
///
/// Returns the entry index. Corpus order breaks ties, so with duplicated
/// questions the earliest row wins.
pub fn exact_match(query: &str, entries: &[QaEntry]) -> Option<usize> {
    let needle = normalize(query);
    entries
        .iter()
        .position(|entry| normalize(&entry.question) == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<QaEntry> {
        vec![
            QaEntry::new("Do you offer refunds?", "Refunds within 30 days."),
            QaEntry::new("Where are you located?", "Berlin."),
            QaEntry::new("do you offer refunds?", "Duplicate row."),
        ]
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let entries = corpus();
        assert_eq!(exact_match("  do you offer REFUNDS?  ", &entries), Some(0));
        assert_eq!(exact_match("WHERE ARE YOU LOCATED?", &entries), Some(1));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let entries = corpus();
        let idx = exact_match("Do You Offer Refunds?", &entries).unwrap();
        assert_eq!(entries[idx].answer, "Refunds within 30 days.");
    }

    #[test]
    fn test_punctuation_is_significant() {
        let entries = corpus();
        assert_eq!(exact_match("Do you offer refunds", &entries), None);
    }

    #[test]
    fn test_inner_whitespace_is_significant() {
        let entries = corpus();
        assert_eq!(exact_match("Do  you offer refunds?", &entries), None);
    }

    #[test]
    fn test_empty_corpus() {
        assert_eq!(exact_match("anything", &[]), None);
    }
}
