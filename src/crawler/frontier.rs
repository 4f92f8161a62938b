//! Crawl frontier: the queue of pages waiting to be fetched
//!
//! The frontier owns three pieces of bookkeeping under one lock:
//! - the FIFO queue of pending tasks
//! - the set of every canonical URL ever accepted (never shrinks)
//! - in-flight and dispatched counters, which decide when the crawl is idle
//!   and enforce the page budget
//!
//! Keeping them under a single mutex makes "is it seen, and if not, queue it"
//! and "is the queue empty and nothing in flight" atomic.

use crate::url::normalize_url;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A page waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Canonical URL (see [`crate::url::normalize_url`]), the dedup and result key
    pub url: String,

    /// Address actually requested, as it was linked or redirected to
    pub fetch_url: String,

    /// Link distance from the seed; the seed is depth 1
    pub depth: u32,

    /// Redirects followed in place to reach `fetch_url`
    pub redirects: u32,
}

impl CrawlTask {
    /// Creates a task for `fetch_url`, keyed by its canonical form
    pub fn new(fetch_url: impl Into<String>, depth: u32) -> Self {
        let fetch_url = fetch_url.into();
        Self {
            url: normalize_url(&fetch_url),
            fetch_url,
            depth,
            redirects: 0,
        }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<CrawlTask>,
    seen: HashSet<String>,
    in_flight: usize,
    dispatched: usize,
    closed: bool,
}

/// Deduplicating work queue shared by all workers
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    budget: usize,
    notify: Notify,
}

impl Frontier {
    /// Creates an empty frontier that dispatches at most `budget` tasks
    pub fn new(budget: usize) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            budget,
            notify: Notify::new(),
        }
    }

    /// Queues a URL unless its canonical form has been seen before
    ///
    /// # Returns
    ///
    /// * `true` - The URL was new and is now queued
    /// * `false` - Already seen, frontier closed, or page budget spent
    pub fn enqueue(&self, fetch_url: impl Into<String>, depth: u32) -> bool {
        let task = CrawlTask::new(fetch_url, depth);
        {
            let mut state = self.state.lock();
            if state.closed || state.dispatched >= self.budget || state.seen.contains(&task.url) {
                return false;
            }
            state.seen.insert(task.url.clone());
            state.queue.push_back(task);
        }

        self.notify.notify_waiters();
        true
    }

    /// Queues a task whose canonical URL was already accepted
    ///
    /// For a page that redirected to another address with the same canonical
    /// form, such as `/docs` to `/docs/`. Skips the seen check but still
    /// respects the page budget and `close`.
    pub fn requeue(&self, task: CrawlTask) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed || state.dispatched >= self.budget {
                return false;
            }
            state.queue.push_back(task);
        }

        self.notify.notify_waiters();
        true
    }

    /// Takes the next task without waiting
    ///
    /// A returned task counts against the page budget and as in flight until
    /// [`Frontier::complete`] is called for it.
    pub fn try_dequeue(&self) -> Option<CrawlTask> {
        let mut state = self.state.lock();
        Self::dequeue_locked(&mut state, self.budget)
    }

    fn dequeue_locked(state: &mut FrontierState, budget: usize) -> Option<CrawlTask> {
        if state.closed || state.dispatched >= budget {
            return None;
        }

        let task = state.queue.pop_front()?;
        state.dispatched += 1;
        state.in_flight += 1;
        Some(task)
    }

    /// Waits for the next task
    ///
    /// Blocks while the queue is empty but other tasks are in flight, since
    /// those may still discover new pages.
    ///
    /// # Returns
    ///
    /// * `Some(CrawlTask)` - A task to fetch
    /// * `None` - The crawl is over for this worker: the frontier is idle,
    ///   the page budget is spent, the frontier was closed, or `cancel` fired
    pub async fn next(&self, cancel: &CancellationToken) -> Option<CrawlTask> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            // Register for wakeups before inspecting state so a notify between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(task) = Self::dequeue_locked(&mut state, self.budget) {
                    return Some(task);
                }
                if state.closed || state.dispatched >= self.budget || state.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Marks one dispatched task as finished
    pub fn complete(&self) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Returns a guard that calls [`Frontier::complete`] when dropped
    ///
    /// Holding the guard for the lifetime of a task keeps the in-flight count
    /// correct even if the task's processing panics.
    pub fn completion_guard(&self) -> CompletionGuard<'_> {
        CompletionGuard { frontier: self }
    }

    /// Stops accepting and dispatching tasks and wakes every waiter
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of dispatched tasks not yet completed
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Number of distinct URLs ever accepted
    pub fn seen_count(&self) -> usize {
        self.state.lock().seen.len()
    }

    /// Returns true once the page budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().dispatched >= self.budget
    }
}

/// Releases a task's in-flight slot on drop
#[must_use = "dropping the guard immediately completes the task"]
pub struct CompletionGuard<'a> {
    frontier: &'a Frontier,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}
