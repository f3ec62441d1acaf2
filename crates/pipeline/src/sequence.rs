//! Pull-based sequence protocol shared by the queue and single-item iterators.

use serde::Serialize;
use thiserror::Error;

use crate::unit_of_work::UnitOfWork;

/// Error returned when pulling from a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The sequence has ended and will never produce another item.
    #[error("no more elements")]
    Exhausted,
}

/// Counters describing what a sequence has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SequenceStats {
    /// Items handed out by `next_item`
    pub delivered: u64,
    /// Items counted as failed (record problems plus `mark_failed` calls)
    pub failed: u64,
    /// `fetch_page` calls that ended in an error after retries
    pub fetch_errors: u64,
    /// Already-delivered items stepped over in later pages
    pub duplicates_skipped: u64,
    /// Pages fetched (including empty ones)
    pub pages: u64,
    /// Page boundaries where the unit of work failed to advance
    pub commit_failures: u64,
    /// The very first fetch failed, so an empty run says nothing about the queue
    pub first_fetch_failed: bool,
    /// The source repeated a delivered window after the offset moved, so the
    /// sequence stopped before reaching an empty page
    pub stalled: bool,
}

/// Lazy, forward-only sequence of work items.
///
/// Ends exactly once: after `has_next` returns `false`, every later call
/// returns `false` and `next_item` returns [`SequenceError::Exhausted`].
pub trait WorkSequence {
    type Item;
    type Uow: UnitOfWork;

    /// Whether another item is available, producing it ahead if needed.
    fn has_next(&mut self) -> bool;

    /// Take the next item.
    fn next_item(&mut self) -> Result<Self::Item, SequenceError>;

    /// Record that the most recently delivered item failed downstream.
    fn mark_failed(&mut self);

    /// Number of failures recorded so far; never decreases.
    fn failed_count(&self) -> u64;

    /// Handle passed through to the action.
    fn unit_of_work(&self) -> &Self::Uow;

    fn stats(&self) -> SequenceStats;
}

impl<S: WorkSequence + ?Sized> WorkSequence for Box<S> {
    type Item = S::Item;
    type Uow = S::Uow;

    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn next_item(&mut self) -> Result<Self::Item, SequenceError> {
        (**self).next_item()
    }

    fn mark_failed(&mut self) {
        (**self).mark_failed()
    }

    fn failed_count(&self) -> u64 {
        (**self).failed_count()
    }

    fn unit_of_work(&self) -> &Self::Uow {
        (**self).unit_of_work()
    }

    fn stats(&self) -> SequenceStats {
        (**self).stats()
    }
}
