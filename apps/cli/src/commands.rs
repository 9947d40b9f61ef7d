//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docharvest_core::{Download, TaskRegistry};
use docharvest_crawler::ContentExtractor;
use docharvest_markdown::{to_markdown, trim_boilerplate};
use docharvest_shared::{
    AppConfig, CrawlConfig, ExportFormat, FailureReason, HarvestError, OutputOptions, Progress,
    TaskState, init_config, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docharvest: turn a documentation site into Markdown.
#[derive(Parser)]
#[command(
    name = "docharvest",
    version,
    about = "Crawl a documentation section and convert it to Markdown.",
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
    /// Crawl a documentation section and write the result.
    Crawl {
        /// Seed URL. The crawl stays on its host and first path segment.
        url: String,

        /// Output format: single-file, zip-tree, or zip-flat.
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Base filename (defaults to the seed's last path segment).
        #[arg(long)]
        filename: Option<String>,

        /// Output directory (defaults to `output.output_dir` from config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Stop after this many pages.
        #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        max_pages: Option<usize>,

        /// Per-page fetch timeout in seconds.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Print the final status as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Convert a local HTML file and print the Markdown.
    Convert {
        /// HTML file to convert.
        file: PathBuf,

        /// URL the page was served from, for resolving relative links.
        #[arg(long)]
        url: Option<String>,
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

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docharvest=info",
        1 => "docharvest=debug",
        _ => "docharvest=trace",
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
        Command::Crawl {
            url,
            format,
            filename,
            out,
            max_pages,
            timeout,
            json,
        } => {
            let args = CrawlArgs {
                format,
                filename,
                out,
                max_pages,
                timeout,
                json,
            };
            cmd_crawl(&url, args).await
        }
        Command::Convert { file, url } => cmd_convert(&file, url.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// crawl
// ---------------------------------------------------------------------------

struct CrawlArgs {
    format: Option<ExportFormat>,
    filename: Option<String>,
    out: Option<PathBuf>,
    max_pages: Option<usize>,
    timeout: Option<u64>,
    json: bool,
}

async fn cmd_crawl(url: &str, args: CrawlArgs) -> Result<()> {
    let config = with_overrides(load_config()?, &args)?;
    let crawl = CrawlConfig::from(&config);

    let options = OutputOptions {
        format: args.format.unwrap_or(config.output.format),
        filename: args.filename,
    };
    let out_dir = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.output.output_dir));

    let start = Instant::now();
    let registry = Arc::new(TaskRegistry::new(crawl)?);
    let id = registry.create(url, options).await?;
    info!(%id, url, "crawl started");

    let ctrl_c = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(%id, "interrupt received, stopping after the current page");
                if let Err(e) = registry.cancel(id).await {
                    warn!(error = %e, "cancel failed");
                }
            }
        })
    };

    let spinner = CrawlProgress::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let progress = loop {
        ticker.tick().await;
        let progress = registry.status(id).await?;
        spinner.update(&progress);
        if progress.state.is_terminal() {
            break progress;
        }
    };
    spinner.finish();
    ctrl_c.abort();

    if let Some(FailureReason::Fault(message)) = &progress.failure {
        registry.shutdown().await;
        return Err(eyre!("crawl failed: {message}"));
    }

    let download = registry.download(id).await?;
    let path = write_download(&out_dir, &download)?;
    registry.shutdown().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        print_summary(&progress, &path, start.elapsed());
    }

    if progress.is_cancelled() {
        return Err(HarvestError::TaskCancelled.into());
    }
    Ok(())
}

/// Apply crawl flags on top of the loaded config and re-check the result.
fn with_overrides(mut config: AppConfig, args: &CrawlArgs) -> Result<AppConfig> {
    if let Some(max) = args.max_pages {
        config.crawl.max_pages = Some(max);
    }
    if let Some(secs) = args.timeout {
        config.crawl.timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn write_download(dir: &Path, download: &Download) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
    let path = dir.join(&download.filename);
    std::fs::write(&path, &download.bytes).map_err(|e| HarvestError::io(&path, e))?;
    info!(path = %path.display(), bytes = download.bytes.len(), "output written");
    Ok(path)
}

fn print_summary(progress: &Progress, path: &Path, elapsed: Duration) {
    let status = match (progress.state, progress.is_cancelled()) {
        (TaskState::Completed, _) => "completed",
        (_, true) => "cancelled (partial output)",
        _ => "failed",
    };

    println!();
    println!("  Crawl {status}");
    println!("  Pages:  {}", progress.processed - progress.failed_pages);
    println!("  Failed: {}", progress.failed_pages);
    println!("  Output: {}", path.display());
    println!("  Time:   {:.1}s", elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing `[processed/total] url`.
struct CrawlProgress {
    spinner: ProgressBar,
}

impl CrawlProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn update(&self, progress: &Progress) {
        let message = match progress.state {
            TaskState::Pending => "Starting".to_string(),
            _ => format!(
                "[{}/{}] {}",
                progress.processed, progress.total_discovered, progress.current_url
            ),
        };
        self.spinner.set_message(message);
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// convert / config
// ---------------------------------------------------------------------------

fn cmd_convert(file: &Path, url: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let extractor = ContentExtractor::new(config.extraction.selectors.clone())?;

    let base = url
        .map(|u| Url::parse(u).map_err(|e| HarvestError::invalid_url(u, e)))
        .transpose()?;

    let html = std::fs::read_to_string(file).map_err(|e| HarvestError::io(file, e))?;
    let extraction = extractor.extract(&html);
    info!(
        selector = extraction.matched.as_deref().unwrap_or("<body>"),
        "content selected"
    );

    let markdown = trim_boilerplate(&to_markdown(&extraction.html, base.as_ref())?);
    print!("{markdown}");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawl_flags() {
        let cli = Cli::try_parse_from([
            "docharvest",
            "-vv",
            "crawl",
            "https://docs.example.com/guide",
            "--format",
            "zip-tree",
            "--max-pages",
            "20",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Crawl {
                url,
                format,
                max_pages,
                timeout,
                json,
                ..
            } => {
                assert_eq!(url, "https://docs.example.com/guide");
                assert_eq!(format, Some(ExportFormat::ZipTree));
                assert_eq!(max_pages, Some(20));
                assert_eq!(timeout, Some(5));
                assert!(!json);
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn rejects_unknown_format() {
        let result = Cli::try_parse_from([
            "docharvest",
            "crawl",
            "https://docs.example.com/guide",
            "--format",
            "pdf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_limits() {
        for flag in ["--timeout", "--max-pages"] {
            let result = Cli::try_parse_from([
                "docharvest",
                "crawl",
                "https://docs.example.com/guide",
                flag,
                "0",
            ]);
            assert!(result.is_err(), "{flag} 0 was accepted");
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let args = CrawlArgs {
            format: None,
            filename: None,
            out: None,
            max_pages: Some(3),
            timeout: Some(7),
            json: false,
        };
        let config = with_overrides(AppConfig::default(), &args).unwrap();
        let crawl = CrawlConfig::from(&config);
        assert_eq!(crawl.max_pages, Some(3));
        assert_eq!(crawl.timeout, Duration::from_secs(7));
    }

    #[test]
    fn overrides_are_validated() {
        let args = CrawlArgs {
            format: None,
            filename: None,
            out: None,
            max_pages: Some(0),
            timeout: None,
            json: false,
        };
        assert!(with_overrides(AppConfig::default(), &args).is_err());
    }

    #[test]
    fn parses_config_and_convert() {
        let cli = Cli::try_parse_from(["docharvest", "--log-format", "json", "config", "show"])
            .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));

        let cli = Cli::try_parse_from(["docharvest", "convert", "page.html", "--url", "https://x.dev/a"])
            .unwrap();
        assert!(matches!(cli.command, Command::Convert { .. }));
    }

    #[test]
    fn writes_download_into_directory() {
        let dir = std::env::temp_dir().join(format!("docharvest-cli-{}", std::process::id()));
        let download = Download {
            filename: "guide.md".to_string(),
            content_type: "text/markdown; charset=utf-8",
            bytes: b"# Guide\n".to_vec(),
        };
        let path = write_download(&dir.join("nested"), &download).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Guide\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
