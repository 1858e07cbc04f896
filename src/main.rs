//! # FAQSense CLI (`faqs`)
//!
//! Answers visitor questions from a tenant's FAQ table.
//!
//! ## Usage
//!
//! ```bash
//! faqs --config ./config/faqs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `faqs ask --tenant <id> "<question>"` | Answer one question |
//! | `faqs chat --tenant <id>` | Answer questions read line by line from stdin |
//! | `faqs bench --tenant <id> --queries <file>` | Time a list of queries |
//! | `faqs inspect --tenant <id>` | Report entry count and duplicate questions |
//!
//! Tables are read from `<knowledge.root>/<tenant>/faqs.csv` unless
//! `--source` names a CSV file directly.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use faqsense::knowledge::resolve_locator;
use faqsense::{ask, bench, config, inspect, logging, Engine, TenantId};

/// FAQSense CLI: hybrid exact, fuzzy, and semantic FAQ matching.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/faqs.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "faqs",
    about = "FAQSense: answer visitor questions from curated FAQ tables",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/faqs.toml`. A missing file at this path means
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/faqs.toml")]
    config: PathBuf,

    /// Log matching decisions to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which knowledge table to use.
#[derive(Args)]
struct TableArgs {
    /// Tenant (chatbot) id.
    #[arg(long)]
    tenant: TenantId,

    /// Read this CSV file instead of the tenant's default table.
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question.
    Ask {
        #[command(flatten)]
        table: TableArgs,

        /// The visitor's question.
        question: String,

        /// Show what every matching stage saw.
        #[arg(long)]
        explain: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Answer questions read line by line from stdin.
    ///
    /// Caches are shared across lines, so only the first semantic query
    /// pays for embedding the table.
    Chat {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Run a list of queries and report stage and latency for each.
    Bench {
        #[command(flatten)]
        table: TableArgs,

        /// File with one query per line, optionally `query<TAB>expected`.
        #[arg(long)]
        queries: PathBuf,
    },

    /// Report entry count and duplicate questions for a table.
    Inspect {
        #[command(flatten)]
        table: TableArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config_or_default(&cli.config)?;
    let locator = |table: &TableArgs| {
        resolve_locator(&cfg.knowledge.root, table.tenant, table.source.as_deref())
    };

    match &cli.command {
        Commands::Ask {
            table,
            question,
            explain,
            json,
        } => {
            let engine = Engine::from_config(&cfg)?;
            ask::run_ask(
                &engine,
                table.tenant,
                &locator(table),
                question,
                &cfg.matching.fallback_message,
                *explain,
                *json,
            )?;
        }
        Commands::Chat { table } => {
            let engine = Engine::from_config(&cfg)?;
            ask::run_chat(
                &engine,
                table.tenant,
                &locator(table),
                &cfg.matching.fallback_message,
                std::io::stdin().lock(),
                std::io::stdout().lock(),
            )?;
        }
        Commands::Bench { table, queries } => {
            let engine = Engine::from_config(&cfg)?;
            bench::run_bench(&engine, table.tenant, &locator(table), queries)?;
        }
        Commands::Inspect { table } => {
            inspect::run_inspect(table.tenant, &locator(table))?;
        }
    }

    Ok(())
}
