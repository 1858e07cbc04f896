//! Diagnostic logging to stderr.
//!
//! `RUST_LOG` takes precedence; otherwise the level is `warn`, or `debug`
//! for this crate with `--verbose`. Stdout stays reserved for answers.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(verbose: bool) {
    let default = if verbose {
        "warn,faqsense=debug"
    } else {
        "warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    let _ = fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
