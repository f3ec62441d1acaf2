//! Paged, self-adjusting iterator over a queue source.
//!
//! ## State machine
//!
//! `Uninitialized -> Active -> Exhausted`. The first pull fetches the first
//! page. Whenever the buffered page runs out, the unit of work is advanced
//! (page boundary) and the next page is fetched. An empty page, or a fetch
//! that fails after retries, moves the iterator to `Exhausted` for good.
//!
//! ## Failures
//!
//! - Missing or unreadable records are skipped inside the same pull and
//!   counted as failures.
//! - `mark_failed` counts a downstream failure; it only affects the offset
//!   of the *next* fetch.
//! - An item already delivered by this iterator is never delivered again.
//!   It is stepped over like a failure, so the next window starts past it
//!   and items behind it are still reached. The sweep ends on an empty page.
//! - A source that keeps answering with the same already-delivered window
//!   although the offset moved is not honouring offsets; the sweep stops and
//!   reports itself as stalled.

use std::collections::{HashSet, VecDeque};
use std::mem;
use std::thread;

use tracing::{debug, error, info, warn};

use regsweep_core::WorkItem;

use crate::cursor::{Cursor, Paging};
use crate::retry::RetryPolicy;
use crate::sequence::{SequenceError, SequenceStats, WorkSequence};
use crate::source::{PageEntry, PageRequest, QueueSource, RecordError, SourceError};
use crate::unit_of_work::UnitOfWork;

/// Lifecycle of a queue iterator. No state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    Uninitialized,
    Active,
    Exhausted,
}

type ItemId<S> = <<S as QueueSource>::Item as WorkItem>::Id;

/// Lazy sequence of items pulled page by page from a [`QueueSource`].
///
/// Keeps the id of every item it has delivered for the lifetime of the
/// iterator, so memory grows by one id per delivered item.
pub struct QueueIterator<S, W>
where
    S: QueueSource,
    W: UnitOfWork,
{
    source: S,
    filter: S::Filter,
    uow: W,
    cursor: Cursor,
    retry: RetryPolicy,
    state: IterState,
    page: VecDeque<PageEntry<S::Item>>,
    page_len: usize,
    page_delivered: usize,
    page_duplicates: Vec<ItemId<S>>,
    stuck_window: Option<Vec<ItemId<S>>>,
    peeked: Option<S::Item>,
    delivered_ids: HashSet<ItemId<S>>,
    stats: SequenceStats,
}

impl<S, W> QueueIterator<S, W>
where
    S: QueueSource,
    W: UnitOfWork,
{
    pub fn new(source: S, filter: S::Filter, uow: W, paging: Paging) -> Self {
        Self {
            source,
            filter,
            uow,
            cursor: Cursor::new(paging),
            retry: RetryPolicy::default(),
            state: IterState::Uninitialized,
            page: VecDeque::new(),
            page_len: 0,
            page_delivered: 0,
            page_duplicates: Vec::new(),
            stuck_window: None,
            peeked: None,
            delivered_ids: HashSet::new(),
            stats: SequenceStats::default(),
        }
    }

    /// Set the policy used for transient fetch failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Produce the next deliverable item, or `None` once exhausted.
    fn try_produce_next(&mut self) -> Option<S::Item> {
        loop {
            match self.state {
                IterState::Exhausted => return None,
                IterState::Uninitialized => {
                    self.refresh_page();
                    continue;
                }
                IterState::Active => {}
            }

            let Some(entry) = self.page.pop_front() else {
                self.end_page();
                if self.source_ignores_offset() {
                    warn!(
                        page_len = self.page_len,
                        skipped = self.cursor.skipped(),
                        "source returned the same delivered window after the offset moved, ending sweep"
                    );
                    self.stats.stalled = true;
                    self.state = IterState::Exhausted;
                    return None;
                }
                self.refresh_page();
                continue;
            };

            match entry {
                Ok(item) => {
                    if self.delivered_ids.insert(item.id().clone()) {
                        self.page_delivered += 1;
                        return Some(item);
                    }
                    self.skip_duplicate(item.id().clone());
                }
                Err(err) => self.skip_record(err),
            }
        }
    }

    fn skip_duplicate(&mut self, id: ItemId<S>) {
        self.cursor.record_skip();
        self.stats.duplicates_skipped += 1;
        debug!(
            item_id = %id,
            skipped = self.cursor.skipped(),
            "stepping over already-delivered item"
        );
        self.page_duplicates.push(id);
    }

    /// Whether the page just drained delivered nothing and repeated the
    /// duplicates of the previous such page.
    fn source_ignores_offset(&mut self) -> bool {
        let duplicates = mem::take(&mut self.page_duplicates);
        if self.page_delivered > 0 || duplicates.is_empty() {
            self.stuck_window = None;
            return false;
        }
        if self.stuck_window.as_ref() == Some(&duplicates) {
            return true;
        }
        self.stuck_window = Some(duplicates);
        false
    }

    fn skip_record(&mut self, err: RecordError) {
        self.cursor.record_failure();
        warn!(
            error = %err,
            failed_count = self.cursor.failed(),
            "skipping unusable record"
        );
    }

    /// Page boundary: let the unit of work commit its bookkeeping.
    fn end_page(&mut self) {
        if let Err(e) = self.uow.advance() {
            self.stats.commit_failures += 1;
            error!(error = %e, "failed to advance unit of work at page boundary");
        }
    }

    fn refresh_page(&mut self) {
        let request = self.cursor.next_request();
        let first = self.cursor.refreshes() == 1;
        self.stats.pages += 1;
        self.page_len = 0;
        self.page_delivered = 0;
        self.page_duplicates.clear();

        match self.fetch_with_retry(request) {
            Ok(entries) if entries.is_empty() => {
                debug!(
                    offset = ?request.offset,
                    limit = ?request.limit,
                    "queue source returned an empty page"
                );
                self.state = IterState::Exhausted;
            }
            Ok(entries) => {
                debug!(
                    offset = ?request.offset,
                    limit = ?request.limit,
                    entries = entries.len(),
                    "fetched page"
                );
                self.page_len = entries.len();
                self.page = entries.into();
                self.state = IterState::Active;
            }
            Err(e) => {
                self.stats.fetch_errors += 1;
                if first {
                    self.stats.first_fetch_failed = true;
                }
                error!(
                    error = %e,
                    offset = ?request.offset,
                    limit = ?request.limit,
                    "fetching page failed, treating as end of queue"
                );
                self.state = IterState::Exhausted;
            }
        }
    }

    fn fetch_with_retry(
        &self,
        request: PageRequest,
    ) -> Result<Vec<PageEntry<S::Item>>, SourceError> {
        let mut delays = self.retry.delays();
        let mut retry = 0u32;
        loop {
            let err = match self.source.fetch_page(&self.filter, request) {
                Ok(entries) => return Ok(entries),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = delays.next() else {
                return Err(err);
            };
            retry += 1;
            info!(
                error = %err,
                retry,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying page fetch"
            );
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

impl<S, W> WorkSequence for QueueIterator<S, W>
where
    S: QueueSource,
    W: UnitOfWork,
{
    type Item = S::Item;
    type Uow = W;

    fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.try_produce_next();
        }
        self.peeked.is_some()
    }

    fn next_item(&mut self) -> Result<S::Item, SequenceError> {
        let item = match self.peeked.take() {
            Some(item) => item,
            None => self.try_produce_next().ok_or(SequenceError::Exhausted)?,
        };
        self.stats.delivered += 1;
        Ok(item)
    }

    fn mark_failed(&mut self) {
        self.cursor.record_failure();
        debug!(failed_count = self.cursor.failed(), "item marked failed");
    }

    fn failed_count(&self) -> u64 {
        self.cursor.failed()
    }

    fn unit_of_work(&self) -> &W {
        &self.uow
    }

    fn stats(&self) -> SequenceStats {
        SequenceStats {
            failed: self.cursor.failed(),
            ..self.stats
        }
    }
}

impl<S, W> Iterator for QueueIterator<S, W>
where
    S: QueueSource,
    W: UnitOfWork,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        self.next_item().ok()
    }
}
