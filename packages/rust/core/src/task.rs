//! One crawl from seed to aggregated output.
//!
//! [`CrawlTask`] owns the frontier, visited-set and page results for its whole
//! lifetime and drives them sequentially. Observers hold a [`TaskHandle`]: a
//! `watch` receiver for progress snapshots, the shared cancel flag, and the
//! slot the task fills with its [`TaskReport`] when it stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use scraper::Html;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use docharvest_crawler::{ContentExtractor, FetchedPage, Frontier, PageFetcher, QueueEntry, extract_links};
use docharvest_markdown::{extract_title, to_markdown, trim_boilerplate};
use docharvest_shared::{
    CrawlConfig, FailureReason, HarvestError, OutputOptions, PageResult, Progress, Result, TaskId,
    TaskState,
};

/// Everything a task produced, stored once when it stops.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub seed_url: String,
    /// Page results in processing order.
    pub pages: Vec<PageResult>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Read side of a running or finished task.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    seed_url: String,
    options: OutputOptions,
    progress: watch::Receiver<Progress>,
    cancel: Arc<AtomicBool>,
    report: Arc<OnceLock<TaskReport>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    /// Consistent snapshot of the current progress.
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Ask the task to stop before its next page.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// The task's report; present once the task has reached a terminal state.
    pub fn report(&self) -> Option<&TaskReport> {
        self.report.get()
    }

    /// Wait until the task is Completed or Failed and return that snapshot.
    pub async fn wait(&self) -> Progress {
        let mut rx = self.progress.clone();
        let reached = rx
            .wait_for(|p| p.state.is_terminal())
            .await
            .map(|progress| progress.clone());

        match reached {
            Ok(progress) => progress,
            // Sender gone without a terminal state: the driving task panicked.
            Err(_) => {
                let mut last = rx.borrow().clone();
                if !last.state.is_terminal() {
                    last.state = TaskState::Failed;
                    last.failure = Some(FailureReason::Fault("crawl task aborted".to_string()));
                }
                last
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

enum Step {
    Page(QueueEntry),
    Cancelled,
    Done,
}

/// What one fetched page yielded.
struct PageOutcome {
    converted: Result<String>,
    links: Vec<String>,
}

/// Sequential crawl state machine: `Pending → Running → {Completed, Failed}`.
pub struct CrawlTask<F> {
    id: TaskId,
    seed_url: String,
    config: CrawlConfig,
    fetcher: Arc<F>,
    extractor: Arc<ContentExtractor>,
    frontier: Frontier,
    pages: Vec<PageResult>,
    progress: watch::Sender<Progress>,
    cancel: Arc<AtomicBool>,
    report: Arc<OnceLock<TaskReport>>,
}

impl<F: PageFetcher> CrawlTask<F> {
    /// Create a Pending task and the handle observers use to follow it.
    pub fn new(
        id: TaskId,
        seed_url: impl Into<String>,
        options: OutputOptions,
        config: CrawlConfig,
        fetcher: Arc<F>,
        extractor: Arc<ContentExtractor>,
    ) -> (Self, TaskHandle) {
        let seed_url = seed_url.into();
        let (tx, rx) = watch::channel(Progress::pending());
        let cancel = Arc::new(AtomicBool::new(false));
        let report = Arc::new(OnceLock::new());

        let handle = TaskHandle {
            id,
            seed_url: seed_url.clone(),
            options,
            progress: rx,
            cancel: Arc::clone(&cancel),
            report: Arc::clone(&report),
        };

        let task = Self {
            id,
            seed_url,
            config,
            fetcher,
            extractor,
            frontier: Frontier::new(),
            pages: Vec::new(),
            progress: tx,
            cancel,
            report,
        };

        (task, handle)
    }

    /// Drive the crawl to a terminal state and return the final progress.
    ///
    /// Page-level failures are recorded and skipped. Only an unusable seed or
    /// cancellation ends the task in `Failed`.
    #[instrument(skip(self), fields(task_id = %self.id, seed = %self.seed_url))]
    pub async fn run(mut self) -> Progress {
        if let Err(e) = self.frontier.seed(&self.seed_url) {
            warn!(error = %e, "seed rejected");
            return self.finish(TaskState::Failed, Some(FailureReason::Fault(e.to_string())));
        }

        self.progress.send_modify(|p| {
            p.state = TaskState::Running;
            p.started_at = Some(Utc::now());
        });
        info!("crawl started");

        loop {
            match self.next_step() {
                Step::Page(entry) => {
                    if !self.frontier.mark_visited(&entry.url) {
                        debug!(url = %entry.url, "already visited, discarding duplicate");
                        continue;
                    }
                    self.process(entry).await;
                }
                Step::Cancelled => {
                    info!(processed = self.processed(), "crawl cancelled");
                    return self.finish(TaskState::Failed, Some(FailureReason::Cancelled));
                }
                Step::Done => break,
            }
        }

        info!(
            processed = self.processed(),
            pages = self.pages.iter().filter(|p| p.success).count(),
            "crawl completed"
        );
        self.finish(TaskState::Completed, None)
    }

    /// Cancellation is checked before every pop.
    fn next_step(&mut self) -> Step {
        if self.cancel.load(Ordering::Acquire) {
            return Step::Cancelled;
        }

        if let Some(max) = self.config.max_pages {
            if self.processed() >= max {
                info!(max_pages = max, dropped = self.frontier.pending(), "page limit reached");
                self.frontier.clear_queue();
                return Step::Done;
            }
        }

        match self.frontier.next() {
            Some(entry) => Step::Page(entry),
            None => Step::Done,
        }
    }

    async fn process(&mut self, entry: QueueEntry) {
        let url = entry.url.to_string();
        self.progress.send_modify(|p| p.current_url = url.clone());

        let fetched = match entry.url.to_url() {
            Ok(target) => self.fetch(&target).await,
            Err(e) => Err(e),
        };

        let mut failed = false;
        let mut discovered = 0;

        match fetched {
            Ok(page) => {
                let outcome = process_page(&self.extractor, &page);

                match outcome.converted {
                    Ok(markdown) if markdown.trim().is_empty() => {
                        debug!(%url, "page has no content after conversion");
                    }
                    Ok(markdown) => {
                        let title = extract_title(&markdown);
                        self.pages.push(PageResult::converted(&url, markdown, title));
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "conversion failed, skipping page");
                        self.pages.push(PageResult::failed(&url));
                        failed = true;
                    }
                }

                for link in &outcome.links {
                    if self.frontier.enqueue_if_new(link, &entry.scope) {
                        discovered += 1;
                    }
                }
            }
            Err(e) => {
                if e.is_page_level() {
                    warn!(%url, error = %e, "page failed, continuing");
                } else {
                    error!(%url, error = %e, "unexpected error on page, recording as failed");
                }
                self.pages.push(PageResult::failed(&url));
                failed = true;
            }
        }

        let total = self.frontier.total_discovered();
        self.progress.send_modify(|p| {
            p.processed += 1;
            if failed {
                p.failed_pages += 1;
            }
            p.total_discovered = total;
        });

        debug!(%url, discovered, total, "page processed");
    }

    /// Fetch through the configured fetcher, bounded by the crawl timeout.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        match tokio::time::timeout(self.config.timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::fetch(
                url,
                format!("timed out after {:?}", self.config.timeout),
            )),
        }
    }

    fn processed(&self) -> usize {
        self.progress.borrow().processed
    }

    /// Store the report, then publish the terminal state.
    fn finish(self, state: TaskState, failure: Option<FailureReason>) -> Progress {
        let finished_at = Utc::now();
        let report = TaskReport {
            seed_url: self.seed_url,
            pages: self.pages,
            finished_at,
        };
        if self.report.set(report).is_err() {
            warn!("task report already stored");
        }

        self.progress.send_modify(|p| {
            p.state = state;
            p.failure = failure;
            p.finished_at = Some(finished_at);
        });
        self.progress.borrow().clone()
    }
}

/// Extract, convert and collect links from one page.
///
/// The parsed document lives only inside this call.
fn process_page(extractor: &ContentExtractor, page: &FetchedPage) -> PageOutcome {
    let doc = Html::parse_document(&page.body);
    let extraction = extractor.extract_from(&doc);
    let links = extract_links(&doc, &page.url);

    let converted = to_markdown(&extraction.html, Some(&page.url)).map(|md| trim_boilerplate(&md));

    PageOutcome { converted, links }
}
