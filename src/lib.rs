//! # FAQSense
//!
//! A hybrid FAQ matching engine for multi-tenant chatbots.
//!
//! Each tenant owns a table of curated question/answer pairs. A visitor's
//! question is resolved by a cascade of progressively more expensive
//! matchers, stopping at the first one that is confident.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────┐   ┌───────┐   ┌──────────┐
//! │ faqs.csv   │──▶│ Knowledge    │──▶│ Exact │──▶│ Fuzzy │──▶│ Semantic │
//! │ per tenant │   │ Store (LRU)  │   └───────┘   └───────┘   └────┬─────┘
//! └────────────┘   └──────────────┘                                │
//!                                          ┌───────────────────────┤
//!                                          ▼                       ▼
//!                                   ┌──────────────┐       ┌──────────────┐
//!                                   │  Embedding   │◀─────▶│  Embedding   │
//!                                   │  Cache (LRU) │       │  Provider    │
//!                                   └──────────────┘       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! faqs ask --tenant 7 "do you offer refunds?"
//! faqs ask --tenant 7 --source ./faqs.csv "can I get my money back" --explain
//! faqs chat --tenant 7 < questions.txt
//! faqs bench --tenant 7 --queries ./queries.tsv
//! faqs inspect --tenant 7
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`knowledge`] | Tenant tables, sources, revision-checked cache |
//! | [`embedding`] | Embedding providers (local, OpenAI, Ollama, hashed) |
//! | [`cache`] | Corpus embedding cache |
//! | [`engine`] | The exact → fuzzy → semantic cascade |
//! | [`ask`] | `ask` and `chat` commands |
//! | [`bench`] | `bench` command |
//! | [`inspect`] | `inspect` command |
//! | [`logging`] | stderr tracing subscriber |
//!
//! The matching algorithms themselves live in `faqsense-core`.

pub mod ask;
pub mod bench;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod inspect;
pub mod knowledge;
pub mod logging;

pub use engine::{Engine, MatchReport};
pub use faqsense_core::models::{FaqMatch, MatchStage, QaEntry, TenantId};
