//! Core domain types shared by the crawler, the task registry, and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HarvestError;

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for crawl task identifiers (opaque, time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new task identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Task state & progress
// ---------------------------------------------------------------------------

/// Lifecycle of a crawl task: `Pending → Running → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    /// Whether the task will never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a task ended in [`TaskState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// The caller requested cancellation.
    Cancelled,
    /// A task-level fault (invalid seed, broken invariant).
    Fault(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Fault(msg) => write!(f, "{msg}"),
        }
    }
}

/// Snapshot of a task's progress.
///
/// `processed <= total_discovered` at every observation; both counters only grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Pages ever enqueued, including duplicate enqueues of the same URL.
    pub total_discovered: usize,
    /// Pages that reached the fetch step.
    pub processed: usize,
    /// Processed pages whose fetch or parse failed.
    pub failed_pages: usize,
    /// URL currently being processed (empty before the first page).
    pub current_url: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// Initial progress of a freshly created task: only the seed is known.
    pub fn pending() -> Self {
        Self {
            total_discovered: 1,
            processed: 0,
            failed_pages: 0,
            current_url: String::new(),
            state: TaskState::Pending,
            failure: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the task ended because its caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, Some(FailureReason::Cancelled))
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::pending()
    }
}

// ---------------------------------------------------------------------------
// PageResult
// ---------------------------------------------------------------------------

/// Outcome of processing one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// Normalized URL of the page.
    pub url: String,
    /// Trimmed Markdown body (empty on failure).
    pub markdown: String,
    pub success: bool,
    /// First H1 of the page, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PageResult {
    /// A successfully converted page.
    pub fn converted(url: impl Into<String>, markdown: String, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            markdown,
            success: true,
            title,
        }
    }

    /// A page whose fetch or parse failed.
    pub fn failed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markdown: String::new(),
            success: false,
            title: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Output options
// ---------------------------------------------------------------------------

/// How the aggregated result is packaged for download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// One Markdown document with all pages.
    #[default]
    SingleFile,
    /// Zip archive preserving the discovered path structure.
    ZipTree,
    /// Zip archive of numbered per-page files at the root.
    ZipFlat,
}

impl ExportFormat {
    /// Whether this format produces a zip archive.
    pub fn is_archive(self) -> bool {
        !matches!(self, Self::SingleFile)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SingleFile => "single-file",
            Self::ZipTree => "zip-tree",
            Self::ZipFlat => "zip-flat",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single-file" | "single" | "md" => Ok(Self::SingleFile),
            "zip-tree" | "zip" => Ok(Self::ZipTree),
            "zip-flat" => Ok(Self::ZipFlat),
            other => Err(HarvestError::config(format!(
                "unknown export format '{other}': expected single-file, zip-tree, or zip-flat"
            ))),
        }
    }
}

/// Caller-supplied output options for a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default)]
    pub format: ExportFormat,
    /// Base filename without extension. Derived from the seed when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

// ---------------------------------------------------------------------------
// CrawlOutput
// ---------------------------------------------------------------------------

/// Aggregated Markdown of a finished task plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutput {
    pub task_id: TaskId,
    /// The seed URL as supplied by the caller.
    pub source_url: String,
    /// Successful page bodies joined in processing order.
    pub content: String,
    /// Number of pages that contributed content.
    pub pages: usize,
    pub failed_pages: usize,
    /// Terminal state the task ended in.
    pub state: TaskState,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_roundtrip() {
        let id = TaskId::new();
        let s = id.to_string();
        let parsed: TaskId = s.parse().expect("parse TaskId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn pending_progress_counts_seed() {
        let p = Progress::pending();
        assert_eq!(p.total_discovered, 1);
        assert_eq!(p.processed, 0);
        assert_eq!(p.state, TaskState::Pending);
        assert!(!p.state.is_terminal());
    }

    #[test]
    fn progress_serialization() {
        let mut p = Progress::pending();
        p.state = TaskState::Failed;
        p.failure = Some(FailureReason::Cancelled);

        let json = serde_json::to_string(&p).expect("serialize");
        assert!(json.contains(r#""state":"failed""#));
        assert!(json.contains(r#""kind":"cancelled""#));

        let parsed: Progress = serde_json::from_str(&json).expect("deserialize");
        assert!(parsed.is_cancelled());
    }

    #[test]
    fn export_format_parsing() {
        assert_eq!("zip-tree".parse::<ExportFormat>().unwrap(), ExportFormat::ZipTree);
        assert_eq!("zip-flat".parse::<ExportFormat>().unwrap(), ExportFormat::ZipFlat);
        assert_eq!(
            "single-file".parse::<ExportFormat>().unwrap(),
            ExportFormat::SingleFile
        );
        assert!("tarball".parse::<ExportFormat>().is_err());
        assert!(ExportFormat::ZipFlat.is_archive());
        assert!(!ExportFormat::SingleFile.is_archive());
    }

    #[test]
    fn output_options_default_to_single_file() {
        let opts: OutputOptions = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(opts.format, ExportFormat::SingleFile);
        assert!(opts.filename.is_none());
    }
}
