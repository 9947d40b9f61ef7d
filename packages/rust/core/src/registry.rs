//! In-memory registry of crawl tasks keyed by opaque task id.
//!
//! Every `create` gets a fresh [`TaskId`] and an independent [`CrawlTask`];
//! two crawls of the same seed never share state. Entries stay until the
//! caller evicts them (directly, via [`TaskRegistry::take_result`], or with
//! [`TaskRegistry::shutdown`]).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use docharvest_crawler::{ContentExtractor, HttpFetcher, PageFetcher, normalize, scope_of};
use docharvest_shared::{
    CrawlConfig, CrawlOutput, HarvestError, OutputOptions, Progress, Result, TaskId,
};

use crate::export::{self, Download};
use crate::task::{CrawlTask, TaskHandle};

/// Creates crawl tasks and answers status, result and cancel queries.
pub struct TaskRegistry<F = HttpFetcher> {
    config: CrawlConfig,
    fetcher: Arc<F>,
    extractor: Arc<ContentExtractor>,
    tasks: RwLock<HashMap<TaskId, Arc<TaskHandle>>>,
}

impl TaskRegistry<HttpFetcher> {
    /// Registry that fetches over HTTP.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: PageFetcher> TaskRegistry<F> {
    /// Registry that fetches through `fetcher`.
    pub fn with_fetcher(config: CrawlConfig, fetcher: F) -> Result<Self> {
        let extractor = ContentExtractor::new(config.selectors.clone())?;
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            tasks: RwLock::new(HashMap::new()),
        })
    }

    /// Start a crawl of `seed_url` in the background and return its id.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, options), fields(format = %options.format))]
    pub async fn create(&self, seed_url: &str, options: OutputOptions) -> Result<TaskId> {
        normalize(seed_url)?;
        scope_of(seed_url)?;

        let id = TaskId::new();
        let (task, handle) = CrawlTask::new(
            id,
            seed_url,
            options,
            self.config.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
        );

        self.tasks.write().await.insert(id, Arc::new(handle));
        tokio::spawn(task.run());

        info!(%id, "task created");
        Ok(id)
    }

    /// Current progress snapshot.
    pub async fn status(&self, id: TaskId) -> Result<Progress> {
        Ok(self.handle(id).await?.progress())
    }

    /// Aggregated Markdown of a finished task.
    ///
    /// Cancelled tasks yield what they collected before stopping.
    pub async fn result(&self, id: TaskId) -> Result<CrawlOutput> {
        let handle = self.handle(id).await?;
        let progress = handle.progress();
        if !progress.state.is_terminal() {
            return Err(HarvestError::NotReady(id));
        }
        let report = handle.report().ok_or(HarvestError::NotReady(id))?;
        Ok(export::crawl_output(id, progress.state, report))
    }

    /// The finished task packaged per its output options.
    pub async fn download(&self, id: TaskId) -> Result<Download> {
        let output = self.result(id).await?;
        let handle = self.handle(id).await?;
        let pages = handle
            .report()
            .map(|r| r.pages.as_slice())
            .unwrap_or_default();
        export::package(&output, pages, handle.options())
    }

    /// Request cancellation. The task stops before its next page.
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        let handle = self.handle(id).await?;
        handle.cancel();
        debug!(%id, "cancellation requested");
        Ok(())
    }

    /// Wait for the task to reach a terminal state.
    pub async fn wait(&self, id: TaskId) -> Result<Progress> {
        let handle = self.handle(id).await?;
        Ok(handle.wait().await)
    }

    /// Remove an entry. Returns whether it existed.
    ///
    /// A still-running task is cancelled first.
    pub async fn evict(&self, id: TaskId) -> bool {
        match self.tasks.write().await.remove(&id) {
            Some(handle) => {
                handle.cancel();
                debug!(%id, "task evicted");
                true
            }
            None => false,
        }
    }

    /// [`result`](Self::result) followed by [`evict`](Self::evict).
    pub async fn take_result(&self, id: TaskId) -> Result<CrawlOutput> {
        let output = self.result(id).await?;
        self.evict(id).await;
        Ok(output)
    }

    /// Cancel every task and clear the registry.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.write().await;
        for handle in tasks.values() {
            handle.cancel();
        }
        info!(count = tasks.len(), "registry shut down");
        tasks.clear();
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn handle(&self, id: TaskId) -> Result<Arc<TaskHandle>> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(HarvestError::NotFound(id))
    }
}
