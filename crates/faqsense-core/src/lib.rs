//! # FAQSense Core
//!
//! Pure matching logic for FAQSense: data models, text normalization,
//! keyword extraction, the token-set ratio scorer, the three matching
//! stages, and the embedding provider trait.
//!
//! This crate performs no filesystem, network, or logging I/O. Loading
//! knowledge tables, computing embeddings, and caching live in the
//! `faqsense` app crate, which drives these stages as a cascade.
//!
//! ```text
//! query ──▶ exact ──▶ fuzzy (+keyword guard) ──▶ semantic (+ambiguity guard) ──▶ match | none
//! ```

pub mod embedding;
pub mod exact;
pub mod fuzzy;
pub mod models;
pub mod semantic;
pub mod text;
