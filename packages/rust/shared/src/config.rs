//! Application configuration for docharvest.
//!
//! User config lives at `~/.docharvest/docharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::types::ExportFormat;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docharvest";

// ---------------------------------------------------------------------------
// Config structs (matching docharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fetch behaviour.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Content extraction heuristics.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Output defaults.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Per-page fetch timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Stop after this many processed pages. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_pages: None,
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("docharvest/", env!("CARGO_PKG_VERSION")).into()
}
fn default_max_redirects() -> usize {
    5
}

/// One entry of the ordered content-selector list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSelector {
    /// Short name used in logs (usually the documentation theme).
    pub label: String,
    /// CSS selector matched against the page.
    pub css: String,
}

impl ContentSelector {
    pub fn new(label: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            css: css.into(),
        }
    }
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Content selectors, most specific first. `<body>` is always the final fallback.
    #[serde(default = "default_selectors")]
    pub selectors: Vec<ContentSelector>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
        }
    }
}

/// Built-in content selectors, most specific first.
pub fn default_selectors() -> Vec<ContentSelector> {
    vec![
        ContentSelector::new("github-docs", "main#article-contents"),
        ContentSelector::new("github-markdown", ".markdown-body"),
        ContentSelector::new("docusaurus", "article .markdown"),
        ContentSelector::new("vitepress", ".vp-doc"),
        ContentSelector::new("gitbook", ".markdown-section"),
        ContentSelector::new("readthedocs", r#".rst-content [role="main"]"#),
        ContentSelector::new("main", "main"),
        ContentSelector::new("article", "article"),
        ContentSelector::new("role-main", r#"[role="main"]"#),
        ContentSelector::new("content", ".content"),
        ContentSelector::new("documentation", ".documentation"),
    ]
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Default export format.
    #[serde(default)]
    pub format: ExportFormat,

    /// Directory downloads are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}

impl AppConfig {
    /// Reject values the crawler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.crawl.timeout_secs == 0 {
            return Err(HarvestError::config("crawl.timeout_secs must be positive"));
        }
        if self.crawl.max_pages == Some(0) {
            return Err(HarvestError::config("crawl.max_pages must be positive"));
        }
        for selector in &self.extraction.selectors {
            if selector.css.trim().is_empty() {
                return Err(HarvestError::config(format!(
                    "extraction.selectors: `{}` has an empty selector",
                    selector.label
                )));
            }
            if let Err(e) = scraper::Selector::parse(&selector.css) {
                return Err(HarvestError::config(format!(
                    "extraction.selectors: `{}` is not a valid selector: {e}",
                    selector.label
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Upper bound on a single page fetch.
    pub timeout: Duration,
    /// Stop after this many processed pages.
    pub max_pages: Option<usize>,
    pub user_agent: String,
    pub max_redirects: usize,
    /// Ordered content selectors.
    pub selectors: Vec<ContentSelector>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            max_pages: config.crawl.max_pages,
            user_agent: config.crawl.user_agent.clone(),
            max_redirects: config.crawl.max_redirects,
            selectors: config.extraction.selectors.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docharvest/docharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
