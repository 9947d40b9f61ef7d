//! FIFO work queue plus visited-set for one crawl.
//!
//! URLs are marked visited when they are *dequeued for processing*, not when
//! they are enqueued. A URL discovered from two pages before either is
//! processed is therefore queued twice and counted twice in
//! `total_discovered`; the second copy is dropped at dequeue time by the
//! visited check.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use docharvest_shared::Result;

use crate::scope::{self, NormalizedUrl, Scope};

/// A page waiting to be processed, with the scope it was discovered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub url: NormalizedUrl,
    pub scope: Scope,
}

/// Breadth-first frontier with a monotonically growing visited-set.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueueEntry>,
    visited: HashSet<NormalizedUrl>,
    total_discovered: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue the normalized start URL under its own scope.
    ///
    /// Resets `total_discovered` to 1.
    pub fn seed(&mut self, url: &str) -> Result<QueueEntry> {
        let normalized = scope::normalize(url)?;
        let scope = scope::scope_of(normalized.as_str())?;
        let entry = QueueEntry {
            url: normalized,
            scope,
        };

        self.queue.push_back(entry.clone());
        self.total_discovered = 1;
        Ok(entry)
    }

    /// Enqueue `url` if it is in scope and not yet visited.
    ///
    /// Returns `false` (and does nothing) for malformed, visited, or
    /// out-of-scope URLs.
    pub fn enqueue_if_new(&mut self, url: &str, scope: &Scope) -> bool {
        let Ok(normalized) = scope::normalize(url) else {
            return false;
        };

        if self.visited.contains(&normalized) {
            return false;
        }

        if !scope::in_scope(normalized.as_str(), scope) {
            debug!(url = %normalized, "out of scope, skipping");
            return false;
        }

        debug!(url = %normalized, "enqueued");
        self.queue.push_back(QueueEntry {
            url: normalized,
            scope: scope.clone(),
        });
        self.total_discovered += 1;
        true
    }

    /// Pop the oldest entry. `None` once the queue is drained.
    ///
    /// The crawl loop is the only producer, so an empty queue between
    /// iterations means no more entries will ever arrive.
    pub fn next(&mut self) -> Option<QueueEntry> {
        self.queue.pop_front()
    }

    /// Record `url` as processed. Returns `false` if it was already visited.
    pub fn mark_visited(&mut self, url: &NormalizedUrl) -> bool {
        self.visited.insert(url.clone())
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    /// Number of enqueues so far, duplicates included.
    pub fn total_discovered(&self) -> usize {
        self.total_discovered
    }

    /// Entries still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every queued entry. Visited state and counters are kept.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }
}
