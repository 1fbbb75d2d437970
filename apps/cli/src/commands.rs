//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use chainfold_core::{
    Engine, FinalResult, NameLengthCap, PaperExtraction, Phase, RetryPolicy, RunObserver,
    TrendAnalysis,
};
use chainfold_llm::build_generator;
use chainfold_segment::{monthly_periods, quarterly_periods};
use chainfold_shared::{
    AppConfig, Page, PeriodWindow, Segment, init_config, load_config, validate_api_key,
};
use chainfold_sources::{ArxivPdf, HnSearch, load_pages, normalize_id};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chainfold — fold long inputs through a language model one segment at a time.
#[derive(Parser)]
#[command(
    name = "chainfold",
    version,
    about = "Incremental LLM accumulation: trend narratives over time and knowledge graphs from documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyse how discussion of a topic evolved across a year.
    Trends {
        /// Search query, e.g. "AI agents".
        query: String,

        /// Year to analyse (defaults to `trends.year`).
        #[arg(short, long)]
        year: Option<i32>,

        /// Analyse months A-B one by one instead of quarters (e.g. 1-3).
        #[arg(short, long, value_parser = parse_month_range)]
        months: Option<(u32, u32)>,

        /// Stories fetched per period (defaults to `trends.search_limit`).
        #[arg(short, long)]
        limit: Option<u32>,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract entities and relationships from a document's pages.
    Extract {
        /// Pages file: JSON (`[[1, "text"], ...]`) or form-feed separated text.
        #[arg(required_unless_present = "arxiv", conflicts_with = "arxiv")]
        pages: Option<PathBuf>,

        /// Download this arXiv paper (e.g. `1706.03762` or `arxiv:1706.03762`) instead.
        #[arg(long, value_name = "ID")]
        arxiv: Option<String>,

        /// Source identifier (defaults to the arXiv id or the file stem).
        #[arg(long)]
        source_id: Option<String>,

        /// Write the extraction JSON here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Limit for the capped category (defaults to `extraction.max_per_category`).
        #[arg(long)]
        max_per_category: Option<usize>,

        /// Category to cap (defaults to `extraction.capped_category`).
        #[arg(long)]
        category: Option<String>,
    },

    /// Print the period windows a trend run would analyse.
    Periods {
        /// Year to plan (defaults to `trends.year`).
        #[arg(short, long)]
        year: Option<i32>,

        /// Plan months A-B instead of quarters.
        #[arg(short, long, value_parser = parse_month_range)]
        months: Option<(u32, u32)>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Parse `A-B` (or a single month `A`) into an inclusive month range.
fn parse_month_range(s: &str) -> std::result::Result<(u32, u32), String> {
    let (start, end) = s.split_once('-').unwrap_or((s, s));
    let month = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{part}' is not a month number"))
    };
    Ok((month(start)?, month(end)?))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chainfold=info",
        1 => "chainfold=debug",
        _ => "chainfold=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Trends {
            query,
            year,
            months,
            limit,
            json,
        } => cmd_trends(&query, year, months, limit, json).await,
        Command::Extract {
            pages,
            arxiv,
            source_id,
            out,
            max_per_category,
            category,
        } => {
            let input = match (arxiv, pages) {
                (Some(id), _) => DocumentInput::Arxiv(id),
                (None, Some(path)) => DocumentInput::Pages(path),
                (None, None) => return Err(eyre!("either a pages file or --arxiv is required")),
            };
            cmd_extract(
                input,
                source_id,
                out.as_deref(),
                max_per_category,
                category,
            )
            .await
        }
        Command::Periods { year, months } => cmd_periods(year, months),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn plan_windows(config: &AppConfig, year: Option<i32>, months: Option<(u32, u32)>) -> Result<Vec<PeriodWindow>> {
    let year = year.unwrap_or(config.trends.year);
    let windows = match months {
        Some((start, end)) => monthly_periods(year, start, end)?,
        None => quarterly_periods(year)?,
    };
    Ok(windows)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_trends(
    query: &str,
    year: Option<i32>,
    months: Option<(u32, u32)>,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let windows = plan_windows(&config, year, months)?;
    let search = HnSearch::new(
        &config.trends.hn_base_url,
        limit.unwrap_or(config.trends.search_limit),
    )?;
    let generator = build_generator(&config.llm)?;

    info!(
        query,
        periods = windows.len(),
        model = %config.llm.model,
        "starting trend analysis"
    );

    let strategy = TrendAnalysis::new(query, windows, Arc::new(search));
    let reporter = CliProgress::new();
    let result = Engine::new(&generator)
        .with_retry(RetryPolicy::from(&config))
        .with_observer(&reporter)
        .run(&strategy)
        .await?;

    match result {
        FinalResult::Narrative(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        other => println!("{}", other.to_display_text()),
    }
    Ok(())
}

/// Where `extract` reads its pages from.
#[derive(Debug)]
enum DocumentInput {
    Pages(PathBuf),
    Arxiv(String),
}

impl DocumentInput {
    /// Fetch or read the pages, returning them with a default source id.
    async fn load(&self, config: &AppConfig) -> Result<(Vec<Page>, String)> {
        match self {
            Self::Pages(path) => {
                let pages = load_pages(path)?;
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| eyre!("cannot derive a source id from '{}'", path.display()))?;
                Ok((pages, stem))
            }
            Self::Arxiv(id) => {
                let id = normalize_id(id)?;
                let spinner = ProgressBar::new_spinner();
                spinner.set_message(format!("Downloading arXiv:{id}"));
                spinner.enable_steady_tick(std::time::Duration::from_millis(120));
                let pages = ArxivPdf::from_config(&config.extraction)?
                    .fetch_pages(id)
                    .await;
                spinner.finish_and_clear();
                Ok((pages?, id.to_string()))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Pages(path) => format!("'{}'", path.display()),
            Self::Arxiv(id) => format!("arXiv paper {id}"),
        }
    }
}

async fn cmd_extract(
    input: DocumentInput,
    source_id: Option<String>,
    out: Option<&Path>,
    max_per_category: Option<usize>,
    category: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let (pages, default_id) = input.load(&config).await?;
    if pages.is_empty() {
        return Err(eyre!("no text found in {}", input.describe()));
    }
    info!(pages = pages.len(), "loaded document");

    let source_id = source_id.unwrap_or(default_id);

    let cap = NameLengthCap::new(
        category.unwrap_or_else(|| config.extraction.capped_category.clone()),
        max_per_category.unwrap_or(config.extraction.max_per_category),
    );
    let strategy = PaperExtraction::from_config(source_id.clone(), pages, &config).with_cap(cap);
    let generator = build_generator(&config.llm)?;

    info!(source_id = %source_id, model = %config.llm.model, "starting extraction");

    let reporter = CliProgress::new();
    let result = Engine::new(&generator)
        .with_retry(RetryPolicy::from(&config))
        .with_observer(&reporter)
        .run(&strategy)
        .await?;

    let FinalResult::Structured(extraction) = result else {
        return Err(eyre!("extraction run produced a narrative result"));
    };
    let json = serde_json::to_string_pretty(&extraction)?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
            println!(
                "Extracted {} entities, {} relationships, {} references to {}",
                extraction.entities.len(),
                extraction.relationships.len(),
                extraction.references.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_periods(year: Option<i32>, months: Option<(u32, u32)>) -> Result<()> {
    let config = load_config()?;
    for window in plan_windows(&config, year, months)? {
        println!("{:<16} {} .. {}", window.label, window.start, window.end);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunObserver for CliProgress {
    fn phase(&self, phase: Phase) {
        match phase {
            Phase::Planning => self.spinner.set_message("Planning segments"),
            Phase::Processing(_) => {}
            Phase::Synthesizing => self.spinner.set_message("Synthesizing"),
            Phase::Done => self.spinner.finish_and_clear(),
        }
    }

    fn planned(&self, segments: &[Segment]) {
        self.spinner
            .set_message(format!("Planned {} segments", segments.len()));
    }

    fn segment_done(&self, segment: &Segment, total: usize) {
        self.spinner.set_message(format!(
            "[{}/{total}] {}",
            segment.index + 1,
            segment.display_label()
        ));
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_ranges() {
        assert_eq!(parse_month_range("1-3"), Ok((1, 3)));
        assert_eq!(parse_month_range("11 - 12"), Ok((11, 12)));
        assert_eq!(parse_month_range("6"), Ok((6, 6)));
        assert!(parse_month_range("jan-mar").is_err());
    }

    #[test]
    fn cli_parses_trends() {
        let cli = Cli::try_parse_from(["chainfold", "trends", "AI agents", "--months", "11-12"])
            .unwrap();
        let Command::Trends { query, months, .. } = cli.command else {
            panic!("expected trends");
        };
        assert_eq!(query, "AI agents");
        assert_eq!(months, Some((11, 12)));
    }

    #[test]
    fn extract_takes_a_file_or_an_arxiv_id() {
        let cli = Cli::try_parse_from(["chainfold", "extract", "--arxiv", "arxiv:1706.03762"])
            .unwrap();
        let Command::Extract { pages, arxiv, .. } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(pages, None);
        assert_eq!(arxiv.as_deref(), Some("arxiv:1706.03762"));

        let cli = Cli::try_parse_from(["chainfold", "extract", "paper.json"]).unwrap();
        let Command::Extract { pages, arxiv, .. } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(pages, Some(PathBuf::from("paper.json")));
        assert_eq!(arxiv, None);

        assert!(Cli::try_parse_from(["chainfold", "extract"]).is_err());
        assert!(
            Cli::try_parse_from(["chainfold", "extract", "paper.json", "--arxiv", "1706.03762"])
                .is_err()
        );
    }

    #[test]
    fn windows_default_to_configured_year() {
        let mut config = AppConfig::default();
        config.trends.year = 2023;
        let windows = plan_windows(&config, None, None).unwrap();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].label, "Q1 2023");

        let monthly = plan_windows(&config, Some(2024), Some((11, 12))).unwrap();
        assert_eq!(monthly[1].label, "December 2024");
        assert!(plan_windows(&config, None, Some((3, 1))).is_err());
    }
}
