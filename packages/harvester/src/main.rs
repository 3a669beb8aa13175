//! CLI entry point for the verse harvester.

use tracing_subscriber::EnvFilter;
use verse_harvester::cli;

fn main() {
    // WARN by default, RUST_LOG overrides; logs go to stderr next to the summary on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
