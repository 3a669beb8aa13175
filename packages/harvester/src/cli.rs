//! Command-line interface for the harvester.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::config::{builtin_works, find_work, WorkConfig, DEFAULT_CONCURRENCY, MAX_QUALITY_SCORE};
use crate::error::{HarvesterError, Result};
use crate::extraction::probe;
use crate::harvester::{extract_chapter, harvest_work, HarvestOptions};
use crate::source::{DirPageSource, HttpPageSource, PageSource};
use crate::types::{ChapterExtraction, ChapterLocator, RunResult};
use crate::yaml::save_yaml;

/// Default output directory for harvested chapters.
const DEFAULT_OUTPUT_DIR: &str = "verses";

/// Verse Harvester - Extract scripture verses from rendered chapter pages.
#[derive(Parser)]
#[command(name = "verse-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Load the work configuration from a YAML file instead of the built-ins
    #[arg(long, global = true)]
    pub work_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the built-in works.
    Works,

    /// Check whether a saved page contains verses.
    Probe {
        /// HTML file to inspect
        file: PathBuf,

        /// Work identifier (e.g., bg)
        #[arg(short, long)]
        work: String,
    },

    /// Extract verses from a saved chapter page.
    Extract {
        /// HTML file to extract from
        file: PathBuf,

        /// Work identifier (e.g., bg)
        #[arg(short, long)]
        work: String,

        /// Chapter number
        #[arg(short, long)]
        chapter: u32,

        /// Division number (canto, lila) for divided works
        #[arg(short, long)]
        division: Option<u32>,

        /// Expected number of verses
        #[arg(long)]
        verses: Option<u32>,

        /// Save the extraction as YAML below this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Harvest a whole work (or one division) concurrently.
    Harvest {
        /// Work identifier (e.g., sb)
        #[arg(short, long)]
        work: String,

        /// Restrict the run to one division
        #[arg(short, long)]
        division: Option<u32>,

        /// Maximum chapters per division
        #[arg(long)]
        max_chapters: Option<u32>,

        /// Number of chapter tasks running at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Read pages from a mirrored directory instead of HTTP
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Output directory (default: verses/)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let work_config = cli.work_config.as_deref();

    match cli.command {
        Commands::Works => works_command(work_config),
        Commands::Probe { file, work } => probe_command(&file, &resolve_work(&work, work_config)?),
        Commands::Extract {
            file,
            work,
            chapter,
            division,
            verses,
            output,
        } => {
            let work = resolve_work(&work, work_config)?;
            let locator = ChapterLocator::new(work.id.clone(), chapter)
                .with_division(division)
                .with_verse_hint(verses);
            extract_command(&file, &work, &locator, output.as_deref())
        }
        Commands::Harvest {
            work,
            division,
            max_chapters,
            concurrency,
            source_dir,
            output,
        } => {
            let work = resolve_work(&work, work_config)?;
            let options = HarvestOptions::default()
                .with_division(division)
                .with_max_chapters(max_chapters)
                .with_concurrency(concurrency);
            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
            harvest_command(work, options, source_dir, &output)
        }
    }
}

/// Pick the configured work: the custom file when its ID matches, else a built-in.
fn resolve_work(id: &str, work_config: Option<&Path>) -> Result<WorkConfig> {
    if let Some(path) = work_config {
        let work = WorkConfig::load(path)?;
        if work.id == id {
            return Ok(work);
        }
        tracing::debug!(requested = id, loaded = %work.id, "custom work ID differs, using built-in");
    }
    find_work(id)
}

fn works_command(work_config: Option<&Path>) -> Result<()> {
    let mut works = builtin_works();
    if let Some(path) = work_config {
        works.push(WorkConfig::load(path)?);
    }

    for work in &works {
        let scope = if work.has_divisions() {
            let chapters: u32 = work.divisions.iter().map(|d| d.chapters).sum();
            format!("{} divisions, up to {chapters} chapters", work.divisions.len())
        } else {
            format!("{} chapters", work.chapters)
        };
        println!(
            "{:<6} {} ({scope})",
            style(&work.id).cyan().bold(),
            work.title
        );
    }
    Ok(())
}

fn probe_command(file: &Path, work: &WorkConfig) -> Result<()> {
    let html = std::fs::read_to_string(file)?;
    match probe(&html, work) {
        Ok(()) => println!("{} {}", style("Verses found:").green().bold(), file.display()),
        Err(miss) => println!(
            "{} {} ({miss:?})",
            style("No verses:").yellow().bold(),
            file.display()
        ),
    }
    Ok(())
}

fn extract_command(
    file: &Path,
    work: &WorkConfig,
    locator: &ChapterLocator,
    output: Option<&Path>,
) -> Result<()> {
    // Validate inputs before reading the page
    work.validate_locator(locator.division, locator.chapter)?;
    if let Some(output_dir) = output {
        ensure_directory(output_dir)?;
    }

    let html = std::fs::read_to_string(file)?;
    let url = work.chapter_url(locator.division, locator.chapter);
    let extraction = extract_chapter(work, &html, locator, &url)?;

    println!(
        "{} {} from {}",
        style("Extracted").bold(),
        style(locator).cyan(),
        file.display()
    );
    print_extraction(&extraction);

    if let Some(output_dir) = output {
        let path = save_yaml(&extraction, output_dir)?;
        println!();
        println!("{} {}", style("Saved to:").green().bold(), path.display());
    }
    Ok(())
}

fn harvest_command(
    work: WorkConfig,
    options: HarvestOptions,
    source_dir: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let source: Arc<dyn PageSource> = match source_dir {
        Some(dir) => {
            ensure_directory(&dir)?;
            Arc::new(DirPageSource::new(dir, work.base_url.clone()))
        }
        None => Arc::new(HttpPageSource::new()?),
    };

    println!(
        "{} {} ({})",
        style("Harvesting").bold(),
        style(&work.id).cyan(),
        work.title
    );

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .expect("valid template"),
    );
    pb.set_message("Fetching and extracting chapters...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let work = Arc::new(work);
    let cancel = CancellationToken::new();

    let result = runtime.block_on(async {
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received SIGINT, stopping after running chapters");
                ctrl_c.cancel();
            }
        });
        harvest_work(source, Arc::clone(&work), options, cancel).await
    });

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message("Saving YAML...");
    let mut saved = 0;
    for chapter in result.chapters.iter().filter(|c| !c.is_empty()) {
        if let Err(e) = save_yaml(chapter, output) {
            pb.finish_and_clear();
            return Err(e);
        }
        saved += 1;
    }
    pb.finish_and_clear();

    print_run(&result);
    println!();
    println!(
        "{} {saved} chapters to {}",
        style("Saved").green().bold(),
        output.display()
    );
    Ok(())
}

fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(HarvesterError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", dir.display()),
        )));
    }
    if !dir.is_dir() {
        return Err(HarvesterError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Path is not a directory: {}", dir.display()),
        )));
    }
    Ok(())
}

fn print_extraction(extraction: &ChapterExtraction) {
    if !extraction.page_found {
        println!("  {}", style("Page has no verses").yellow());
        return;
    }

    println!("  Verses: {}", extraction.records.len());
    println!("  Accepted: {}", style(extraction.accepted_count()).green());
    if extraction.degraded_count() > 0 {
        println!("  Degraded: {}", style(extraction.degraded_count()).yellow().bold());
    }
    if extraction.skipped_nodes > 0 {
        println!("  Skipped nodes: {}", extraction.skipped_nodes);
    }

    for record in &extraction.records {
        let score = format!("{}/{MAX_QUALITY_SCORE}", record.quality.score);
        let score = if record.passes_quality_gate() {
            style(score).green()
        } else {
            style(score).yellow()
        };
        let merged = if record.is_merged() {
            format!(" merged {:?}", record.merged_with())
        } else {
            String::new()
        };
        println!(
            "  {:>4} {score} {}{merged}",
            record.id.verse, record.provenance.method
        );
    }

    for warning in &extraction.warnings {
        println!("  {} {warning}", style("Warning:").yellow());
    }
}

fn print_run(result: &RunResult) {
    println!("  Chapters: {}", result.chapters.len());
    println!("  Verses: {}", result.total_records());
    println!("  Accepted: {}", style(result.accepted_count()).green());
    if result.degraded_count() > 0 {
        println!("  Degraded: {}", style(result.degraded_count()).yellow().bold());
    }
    println!("  Duration: {:.1}s", result.duration.as_secs_f64());
    if result.cancelled {
        println!("  {}", style("Cancelled before all chapters were issued").yellow());
    }
    for error in &result.errors {
        println!("  {} {error}", style("Error:").red());
    }
}
